use crate::models::ErrorResponse;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::time::Duration;

/// Everything that can go wrong while relaying a chat request.
///
/// Every variant renders as `{"error": "<message>"}`; only the status differs.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The upstream answered with a non-success status.
    #[error("{message}")]
    Upstream { status: StatusCode, message: String },

    #[error("upstream request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("failed to reach upstream: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("failed to read upstream response: {0}")]
    Body(#[from] axum::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to build upstream request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("invalid upstream credential: {0}")]
    Credential(#[from] axum::http::header::InvalidHeaderValue),

    #[error("invalid upstream URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("upstream concurrency limiter closed")]
    LimiterClosed(#[from] tokio::sync::AcquireError),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Upstream { status, .. } => *status,
            RelayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
