//! Common test utilities and a mock Dify server for E2E testing

#![allow(dead_code)]

use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use dify_relay_core::{Dispatcher, RelayConfig};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

// ============================================================================
// Test Configuration
// ============================================================================

/// Test API key (long enough to pass normalization)
pub const TEST_API_KEY: &str = "app-test0123456789";

/// Relay config with a short upstream timeout
pub fn create_test_config() -> RelayConfig {
    RelayConfig {
        upstream_timeout: Some(Duration::from_secs(2)),
        ..RelayConfig::default()
    }
}

/// HTTP client that ignores proxy settings from the environment
pub fn create_test_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(timeout)
        .build()
        .unwrap()
}

/// Dispatcher talking to local mock servers
pub fn create_test_dispatcher() -> Dispatcher {
    Dispatcher::with_client(
        create_test_client(Duration::from_secs(2)),
        &create_test_config(),
    )
}

/// Address with nothing listening on it
pub async fn closed_port_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

// ============================================================================
// Mock Dify Server
// ============================================================================

/// Canned response for one path
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    pub delay: Option<Duration>,
}

impl CannedResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn html(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/html",
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.to_string(),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// One request as seen by the mock
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// State for the mock Dify server
#[derive(Default)]
pub struct MockDifyState {
    /// Canned responses keyed by path
    pub responses: RwLock<HashMap<String, CannedResponse>>,
    /// Request log
    pub requests: RwLock<Vec<RecordedRequest>>,
}

impl MockDifyState {
    pub async fn last_request(&self) -> RecordedRequest {
        self.requests.read().await.last().cloned().unwrap()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.read().await.len()
    }
}

/// Start a mock Dify server serving `routes`; unknown paths get Dify's 404
pub async fn start_mock_dify(
    routes: Vec<(&str, CannedResponse)>,
) -> (SocketAddr, Arc<MockDifyState>) {
    let state = Arc::new(MockDifyState::default());
    {
        let mut responses = state.responses.write().await;
        for (path, response) in routes {
            responses.insert(path.to_string(), response);
        }
    }

    let app = Router::new()
        .fallback(mock_dify_handler)
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

async fn mock_dify_handler(
    State(state): State<Arc<MockDifyState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let recorded = RecordedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        headers: headers
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
            .collect(),
        body,
    };
    state.requests.write().await.push(recorded);

    let canned = state.responses.read().await.get(uri.path()).cloned();
    let canned = canned.unwrap_or_else(|| {
        CannedResponse::json(
            404,
            serde_json::json!({
                "code": "not_found",
                "message": "The requested URL was not found on the server.",
                "status": 404
            }),
        )
    });

    if let Some(delay) = canned.delay {
        tokio::time::sleep(delay).await;
    }

    (
        StatusCode::from_u16(canned.status).unwrap(),
        [("content-type", canned.content_type)],
        canned.body,
    )
        .into_response()
}
