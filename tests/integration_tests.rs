//! Integration tests for the chat relay
//!
//! These tests drive the public router with slow upstream clients to check the
//! timeout and concurrency bounds end to end.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chat_relay::auth::ApiKey;
use chat_relay::client::HttpClient;
use chat_relay::{AppState, RelaySettings, build_router};
use futures_util::future::join_all;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tower::util::ServiceExt; // for oneshot()

/// An upstream that answers every call with a fixed completion after `delay`,
/// tracking how many calls overlap.
#[derive(Debug, Clone)]
struct SlowUpstream {
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl SlowUpstream {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl HttpClient for SlowUpstream {
    async fn request(
        &self,
        _req: axum::extract::Request,
    ) -> Result<axum::response::Response, Box<dyn std::error::Error + Send + Sync>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(axum::response::Response::builder()
            .status(StatusCode::OK)
            .body(Body::from(
                r#"{"choices":[{"message":{"content":"slow hello"}}]}"#,
            ))?)
    }
}

fn settings() -> RelaySettings {
    RelaySettings::builder()
        .api_key(ApiKey::new("sk-integration"))
        .upstream_url("https://api.openai.com/v1/".parse().unwrap())
        .build()
}

fn chat_request() -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::to_vec(&json!({
                "messages": [{"role": "user", "content": "Hello"}]
            }))
            .unwrap(),
        ))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_upstream_timeout_returns_gateway_timeout() {
    let mut settings = settings();
    settings.upstream_timeout = Duration::from_millis(50);
    let upstream = SlowUpstream::new(Duration::from_secs(5));
    let app = build_router(AppState::with_client(settings, upstream));

    let response = app.oneshot(chat_request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let body = json_body(response).await;
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("timed out"), "unexpected message: {message}");
}

#[tokio::test]
async fn test_upstream_within_timeout_succeeds() {
    let mut settings = settings();
    settings.upstream_timeout = Duration::from_secs(5);
    let upstream = SlowUpstream::new(Duration::from_millis(10));
    let app = build_router(AppState::with_client(settings, upstream));

    let response = app.oneshot(chat_request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"text": "slow hello"}));
}

#[tokio::test]
async fn test_concurrency_limit_bounds_in_flight_calls() {
    let mut settings = settings();
    settings.max_concurrent_upstream = Some(2);
    let upstream = SlowUpstream::new(Duration::from_millis(50));
    let app = build_router(AppState::with_client(settings, upstream.clone()));

    let responses = join_all((0..6).map(|_| app.clone().oneshot(chat_request()))).await;

    for response in responses {
        assert_eq!(response.unwrap().status(), StatusCode::OK);
    }
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 6);
    assert!(upstream.max_in_flight.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_requests_run_concurrently_without_a_limit() {
    let upstream = SlowUpstream::new(Duration::from_millis(100));
    let app = build_router(AppState::with_client(settings(), upstream.clone()));

    let responses = join_all((0..4).map(|_| app.clone().oneshot(chat_request()))).await;

    for response in responses {
        assert_eq!(response.unwrap().status(), StatusCode::OK);
    }
    assert_eq!(upstream.max_in_flight.load(Ordering::SeqCst), 4);
}
