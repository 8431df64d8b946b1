/// Request and response bodies of the `/chat` route.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Lower bound for the token limit sent upstream.
pub const MIN_OUTPUT_TOKENS: u32 = 32;
/// Upper bound for the token limit sent upstream.
pub const MAX_OUTPUT_TOKENS: u32 = 2000;

/// The body the caller posts to `/chat`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    /// Conversation history, forwarded to the upstream untouched.
    pub messages: Vec<Value>,
    pub model: Option<String>,
    /// Kept as raw JSON: numbers and numeric strings are both accepted.
    pub max_output_tokens: Option<Value>,
}

impl ChatRequest {
    /// Parses a request body, treating anything unusable as an empty request.
    ///
    /// An empty body, invalid JSON, or a non-object yield `ChatRequest::default()`.
    /// Fields are read independently: one of the wrong type is dropped without
    /// affecting the others.
    pub fn from_body(body: &[u8]) -> Self {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Self::default();
        }
        let mut object = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(object)) => object,
            Ok(other) => {
                debug!("Chat request body is not an object, falling back to defaults: {}", other);
                return Self::default();
            }
            Err(e) => {
                debug!("Unusable chat request body, falling back to defaults: {}", e);
                return Self::default();
            }
        };

        let messages = match object.remove("messages") {
            Some(Value::Array(messages)) => messages,
            _ => Vec::new(),
        };
        let model = match object.remove("model") {
            Some(Value::String(model)) => Some(model),
            _ => None,
        };
        let max_output_tokens = object.remove("max_output_tokens").filter(|v| !v.is_null());

        Self {
            messages,
            model,
            max_output_tokens,
        }
    }
}

/// The body returned to the caller on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
    /// The untouched upstream payload, only present when the relay exposes it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

/// The body returned to the caller on any failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Resolves the caller's `max_output_tokens` to the value sent upstream.
///
/// Missing or non-numeric input falls back to `default`; the result always lies
/// within [`MIN_OUTPUT_TOKENS`, `MAX_OUTPUT_TOKENS`], with any fraction dropped.
pub fn clamp_max_output_tokens(requested: Option<&Value>, default: u32) -> u32 {
    let tokens = requested
        .and_then(numeric_value)
        .unwrap_or_else(|| f64::from(default));
    tokens
        .clamp(f64::from(MIN_OUTPUT_TOKENS), f64::from(MAX_OUTPUT_TOKENS))
        .trunc() as u32
}

fn numeric_value(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}
