//! Common test utilities for router E2E tests

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use dify_relay_adaptor_web::{build_router, RelayState};
use dify_relay_core::RelayConfig;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Test API key (long enough to pass normalization)
pub const TEST_API_KEY: &str = "app-test0123456789";

/// Router wired to a proxy-free client with a short timeout
pub fn create_test_router() -> Router {
    create_test_router_with(RelayConfig {
        upstream_timeout: Some(Duration::from_secs(2)),
        ..RelayConfig::default()
    })
}

/// Router with a custom configuration
pub fn create_test_router_with(config: RelayConfig) -> Router {
    let client = reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    build_router(RelayState::with_client(config, client))
}

/// POST a JSON body to the router
pub fn json_request(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Read a response body as JSON
pub async fn extract_json<T: DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// Mock Dify Server
// ============================================================================

/// State for the mock Dify server
#[derive(Default)]
pub struct MockDifyState {
    /// Bodies received on the chat endpoint
    pub chat_bodies: RwLock<Vec<Value>>,
    /// Authorization headers received
    pub auth_headers: RwLock<Vec<String>>,
}

/// Start a mock Dify server
///
/// - `/v1/chat-messages` answers with a fixed conversation id
/// - `/v1/workflows/run` answers with nested `data.outputs`
/// - `/bad/v1/chat-messages` rejects the key
/// - `/ngrok/v1/chat-messages` serves an interstitial page with status 200
/// - `/health` and `/sick/health` report liveness
pub async fn start_mock_dify() -> (SocketAddr, Arc<MockDifyState>) {
    let state = Arc::new(MockDifyState::default());

    let app = Router::new()
        .route("/v1/chat-messages", post(mock_chat))
        .route("/v1/workflows/run", post(mock_workflow))
        .route("/bad/v1/chat-messages", post(mock_unauthorized))
        .route("/ngrok/v1/chat-messages", post(mock_ngrok_page))
        .route("/health", get(mock_health))
        .route("/sick/health", get(mock_sick))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

async fn mock_chat(
    State(state): State<Arc<MockDifyState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        state.auth_headers.write().await.push(auth.to_string());
    }
    let query = body["query"].as_str().unwrap_or_default().to_string();
    state.chat_bodies.write().await.push(body);

    Json(json!({
        "event": "message",
        "message_id": "msg-1",
        "conversation_id": "conv-abc",
        "mode": "chat",
        "answer": format!("echo: {}", query),
        "created_at": 1705395332
    }))
}

async fn mock_workflow(Json(body): Json<Value>) -> impl IntoResponse {
    Json(json!({
        "workflow_run_id": "run-1",
        "task_id": "task-1",
        "data": {
            "status": "succeeded",
            "outputs": { "text": format!("ran: {}", body["inputs"]["query"].as_str().unwrap_or_default()) }
        }
    }))
}

async fn mock_unauthorized() -> impl IntoResponse {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({
            "code": "unauthorized",
            "message": "Access token is invalid",
            "status": 401
        })),
    )
}

async fn mock_ngrok_page() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/html")],
        "<!DOCTYPE html><html><body>You are about to visit</body></html>",
    )
}

async fn mock_health() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "model": "test" }))
}

async fn mock_sick() -> impl IntoResponse {
    Json(json!({ "status": "loading" }))
}
