/// Axum handler for the `/chat` route
use crate::AppState;
use crate::client::HttpClient;
use crate::errors::RelayError;
use crate::models::{ChatRequest, ChatResponse, clamp_max_output_tokens};
use crate::upstream::upstream_error_message;
use axum::{
    Json,
    body::{Body, Bytes},
    extract::State,
    http::{
        Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
};
use tracing::{debug, error, info, instrument, warn};

/// Relays one chat request to the upstream and normalizes the outcome.
///
/// The body is read as raw bytes so that a missing or malformed body degrades
/// to an empty request instead of a rejection.
#[instrument(skip(state, body))]
pub async fn chat_handler<T: HttpClient + Clone + Send + Sync + 'static>(
    State(state): State<AppState<T>>,
    body: Bytes,
) -> Result<Json<ChatResponse>, RelayError> {
    let request = ChatRequest::from_body(&body);
    relay_chat(&state, request).await.map(Json)
}

/// Shapes the upstream call for `request`, performs it, and extracts the reply text.
pub async fn relay_chat<T: HttpClient + Sync>(
    state: &AppState<T>,
    request: ChatRequest,
) -> Result<ChatResponse, RelayError> {
    let settings = &state.settings;
    let shape = settings.shape;

    let max_tokens = clamp_max_output_tokens(
        request.max_output_tokens.as_ref(),
        shape.default_max_output_tokens(),
    );
    let model = settings.model_for(request.model);
    info!(
        model = %model,
        max_tokens,
        shape = ?shape,
        messages = request.messages.len(),
        "Relaying chat request"
    );

    let body = serde_json::to_vec(&shape.request_body(model, request.messages, max_tokens))?;
    let endpoint = settings.endpoint()?;
    let upstream_req = Request::builder()
        .method(Method::POST)
        .uri(endpoint.as_str())
        .header(AUTHORIZATION, settings.api_key.bearer_header()?)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body))?;

    // Held until the upstream body has been read.
    let _permit = match &state.upstream_permits {
        Some(permits) => Some(permits.acquire().await?),
        None => None,
    };

    let exchange = async {
        let response = state
            .http_client
            .request(upstream_req)
            .await
            .map_err(RelayError::Transport)?;
        let status = response.status();
        let bytes =
            axum::body::to_bytes(response.into_body(), settings.max_upstream_body_bytes).await?;
        Ok::<_, RelayError>((status, bytes))
    };

    let (status, bytes) = match tokio::time::timeout(settings.upstream_timeout, exchange).await {
        Ok(Ok(exchange)) => exchange,
        Ok(Err(e)) => {
            error!("Error forwarding request to {}: {}", endpoint, e);
            return Err(e);
        }
        Err(_) => {
            error!(
                "Upstream {} did not answer within {:?}",
                endpoint, settings.upstream_timeout
            );
            return Err(RelayError::Timeout(settings.upstream_timeout));
        }
    };

    if !status.is_success() {
        let message = upstream_error_message(status, &bytes);
        warn!(status = status.as_u16(), "Upstream returned an error: {}", message);
        return Err(RelayError::Upstream { status, message });
    }

    debug!("Received upstream response of size: {}", bytes.len());
    let raw: serde_json::Value = serde_json::from_slice(&bytes)?;
    let text = shape.parse_payload(&raw)?.text();

    Ok(ChatResponse {
        text,
        raw: settings.include_raw.then_some(raw),
    })
}
