//! chat-relay - a single-route chat proxy for OpenAI-style APIs
//!
//! This library accepts chat requests on `POST /chat`, clamps their parameters,
//! forwards them to an upstream completion API with an injected credential, and
//! returns the extracted completion text in a uniform JSON shape.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{Method, header::CONTENT_TYPE};
use axum::routing::post;
use bon::Builder;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, instrument};
use url::Url;

pub mod auth;
pub mod client;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod upstream;

use auth::ApiKey;
use client::HttpClient;
use handlers::chat_handler;
use upstream::UpstreamShape;

/// Largest request body the relay accepts.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Default cap on how much of an upstream response body is buffered.
pub const DEFAULT_MAX_UPSTREAM_BODY_BYTES: usize = 16 * 1024 * 1024;

pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);

/// How the relay reaches the upstream, fixed for the lifetime of the process.
#[derive(Debug, Clone, Builder)]
pub struct RelaySettings {
    pub api_key: ApiKey,
    /// Base URL the shape's endpoint path is resolved against, e.g. `https://api.openai.com/v1/`.
    pub upstream_url: Url,
    #[builder(default)]
    pub shape: UpstreamShape,
    /// Overrides the shape's default model for requests that don't name one.
    pub default_model: Option<String>,
    #[builder(default = DEFAULT_UPSTREAM_TIMEOUT)]
    pub upstream_timeout: Duration,
    /// Upstream responses larger than this are rejected instead of buffered.
    #[builder(default = DEFAULT_MAX_UPSTREAM_BODY_BYTES)]
    pub max_upstream_body_bytes: usize,
    /// Maximum number of upstream calls in flight. `None` leaves them unbounded.
    pub max_concurrent_upstream: Option<usize>,
    /// Whether successful responses also carry the untouched upstream payload.
    #[builder(default)]
    pub include_raw: bool,
}

impl RelaySettings {
    /// The full upstream URL for the configured shape.
    pub fn endpoint(&self) -> Result<Url, url::ParseError> {
        let mut base = self.upstream_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(self.shape.endpoint_path())
    }

    /// Model precedence: the caller's choice, then the configured default, then the shape default.
    pub fn model_for(&self, requested: Option<String>) -> String {
        requested
            .or_else(|| self.default_model.clone())
            .unwrap_or_else(|| self.shape.default_model().to_owned())
    }
}

/// The application state shared by every request: the HTTP client and the relay settings
#[derive(Clone, Debug)]
pub struct AppState<T: HttpClient> {
    pub http_client: T,
    pub settings: Arc<RelaySettings>,
    pub upstream_permits: Option<Arc<Semaphore>>,
}

impl<T: HttpClient> AppState<T> {
    /// Create a new AppState around any HTTP client (mock clients in tests, hyper in production)
    pub fn with_client(settings: RelaySettings, http_client: T) -> Self {
        let upstream_permits = settings
            .max_concurrent_upstream
            .map(|limit| Arc::new(Semaphore::new(limit)));
        Self {
            http_client,
            settings: Arc::new(settings),
            upstream_permits,
        }
    }
}

/// CORS policy for callers embedded in pages on other origins.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
}

/// Build the router for the relay
/// This creates a single route:
/// - `POST /chat` - Relays a chat request to the configured upstream
#[instrument(skip(state))]
pub fn build_router<T: HttpClient + Clone + Send + Sync + 'static>(state: AppState<T>) -> Router {
    info!("Building router");
    Router::new()
        .route("/chat", post(chat_handler::<T>))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors_layer())
        .with_state(state)
}
