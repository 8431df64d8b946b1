//! Upstream API shapes
//!
//! The relay talks to one of two OpenAI-style endpoints. Each shape decides the
//! endpoint path, the outbound body, the defaults, and how completion text is
//! pulled out of a successful response.
//!
//! - completions: `POST {base}/chat/completions`, text at `choices[0].message.content`
//! - responses: `POST {base}/responses`, text at `output_text` or `output[].content[0].text`

use axum::http::StatusCode;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// System message prepended to every conversation sent in the responses shape.
pub const SYSTEM_PREAMBLE: &str =
    "You are a helpful, concise assistant. Keep every answer safe and appropriate for minors.";

/// Which upstream endpoint the relay targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamShape {
    #[default]
    Completions,
    Responses,
}

impl UpstreamShape {
    /// Path relative to the upstream base URL.
    pub fn endpoint_path(self) -> &'static str {
        match self {
            UpstreamShape::Completions => "chat/completions",
            UpstreamShape::Responses => "responses",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            UpstreamShape::Completions => "gpt-3.5-turbo",
            UpstreamShape::Responses => "gpt-4o-mini",
        }
    }

    /// Token limit used when the caller doesn't send a usable one.
    pub fn default_max_output_tokens(self) -> u32 {
        match self {
            UpstreamShape::Completions => 200,
            UpstreamShape::Responses => 400,
        }
    }

    pub fn request_body(self, model: String, messages: Vec<Value>, max_tokens: u32) -> UpstreamRequest {
        match self {
            UpstreamShape::Completions => UpstreamRequest::Completions(CompletionsRequest {
                model,
                messages,
                max_tokens,
            }),
            UpstreamShape::Responses => {
                let mut input = Vec::with_capacity(messages.len() + 1);
                input.push(json!({ "role": "system", "content": SYSTEM_PREAMBLE }));
                input.extend(messages);
                UpstreamRequest::Responses(ResponsesRequest {
                    model,
                    input,
                    max_output_tokens: max_tokens,
                })
            }
        }
    }

    /// Interprets a successful upstream body according to this shape.
    pub fn parse_payload(self, raw: &Value) -> Result<UpstreamPayload, serde_json::Error> {
        Ok(match self {
            UpstreamShape::Completions => {
                UpstreamPayload::Completions(CompletionsPayload::deserialize(raw)?)
            }
            UpstreamShape::Responses => UpstreamPayload::Responses(ResponsesPayload::deserialize(raw)?),
        })
    }
}

/// Body for `POST /chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionsRequest {
    pub model: String,
    pub messages: Vec<Value>,
    pub max_tokens: u32,
}

/// Body for `POST /responses`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponsesRequest {
    pub model: String,
    pub input: Vec<Value>,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UpstreamRequest {
    Completions(CompletionsRequest),
    Responses(ResponsesRequest),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CompletionsPayload {
    #[serde(default)]
    pub choices: Option<Vec<Choice>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResponsesPayload {
    #[serde(default)]
    pub output_text: Option<String>,
    #[serde(default)]
    pub output: Option<Vec<OutputItem>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OutputItem {
    #[serde(default)]
    pub content: Option<Vec<OutputContent>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OutputContent {
    #[serde(default)]
    pub text: Option<String>,
}

/// A successful upstream body, tagged by the shape it was parsed as.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamPayload {
    Completions(CompletionsPayload),
    Responses(ResponsesPayload),
}

impl UpstreamPayload {
    /// The completion text, empty when the upstream didn't provide any.
    pub fn text(self) -> String {
        match self {
            UpstreamPayload::Completions(payload) => payload.text(),
            UpstreamPayload::Responses(payload) => payload.text(),
        }
    }
}

impl CompletionsPayload {
    fn text(self) -> String {
        self.choices
            .and_then(|choices| choices.into_iter().next())
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default()
    }
}

impl ResponsesPayload {
    fn text(self) -> String {
        if let Some(text) = self.output_text {
            return text;
        }
        self.output
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| item.content?.into_iter().next()?.text)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Picks the message to surface for a non-success upstream response.
///
/// Prefers `error.message` from a JSON error envelope, then the raw body text,
/// then a generic message naming the status.
pub fn upstream_error_message(status: StatusCode, body: &[u8]) -> String {
    let from_envelope = serde_json::from_slice::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
        .and_then(|detail| detail.message)
        .filter(|message| !message.is_empty());
    if let Some(message) = from_envelope {
        return message;
    }

    let text = String::from_utf8_lossy(body);
    if !text.is_empty() {
        return text.into_owned();
    }

    format!("Request failed with status {}", status.as_u16())
}
