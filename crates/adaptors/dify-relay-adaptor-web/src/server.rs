//! Relay HTTP server
//!
//! Serves the proxy routes and the health probe with:
//! - CORS support for browser callers
//! - Per-request tracing spans
//! - Request body size limit

use crate::handlers::{answer_handler, health_check, health_probe_handler, proxy_handler};
use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{header, Method, Request},
    routing::{get, post},
    Router,
};
use dify_relay_core::{Dispatcher, HealthProbe, RelayConfig, RelayError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span};
use uuid::Uuid;

/// Shared handler state
#[derive(Clone)]
pub struct RelayState {
    /// Server configuration
    pub config: Arc<RelayConfig>,
    /// Upstream dispatcher
    pub dispatcher: Dispatcher,
    /// API server liveness probe
    pub probe: HealthProbe,
}

impl RelayState {
    /// Build state with HTTP clients derived from `config`
    pub fn new(config: RelayConfig) -> Result<Self> {
        let dispatcher = Dispatcher::new(&config)?;
        let probe = HealthProbe::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            dispatcher,
            probe,
        })
    }

    /// Build state around an existing HTTP client
    pub fn with_client(config: RelayConfig, client: reqwest::Client) -> Self {
        Self {
            dispatcher: Dispatcher::with_client(client.clone(), &config),
            probe: HealthProbe::with_client(client),
            config: Arc::new(config),
        }
    }
}

/// Build the Axum router
pub fn build_router(state: RelayState) -> Router {
    let config = state.config.clone();

    let mut router = Router::new()
        .route("/health", get(health_check))
        .route("/api/health", get(health_probe_handler))
        .route("/api/dify", post(proxy_handler))
        .route("/proxy/dify", post(proxy_handler))
        .route("/api/dify/answer", post(answer_handler))
        .with_state(state)
        // Checked by the Json extractor; rejections render as `{ error }`
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                info_span!(
                    "http_request",
                    request_id = %Uuid::new_v4(),
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        );

    // Outermost so preflight requests never reach the routes
    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .max_age(config.cors_max_age);
        router = router.layer(cors);
    }

    router
}

/// Relay server service
pub struct RelayServer {
    state: RelayState,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    local_addr: Option<SocketAddr>,
}

impl RelayServer {
    /// Create a relay server from configuration
    pub fn new(config: RelayConfig) -> Result<Self> {
        Ok(Self::with_state(RelayState::new(config)?))
    }

    /// Create a relay server from prepared state
    pub fn with_state(state: RelayState) -> Self {
        Self {
            state,
            shutdown_tx: None,
            local_addr: None,
        }
    }

    /// Router serving this server's state
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Bind and serve in the background; returns the bound address
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if self.is_running() {
            return Err(RelayError::config("Server already running"));
        }

        let addr = self.state.config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| RelayError::config(format!("Failed to bind to {}: {}", addr, e)))?;
        let local_addr = listener.local_addr()?;
        info!("Starting Dify relay on {}", local_addr);

        let router = self.router();
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.shutdown_tx = Some(tx);
        self.local_addr = Some(local_addr);

        tokio::spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(async {
                let _ = rx.await;
            });
            if let Err(e) = server.await {
                error!("Server error: {}", e);
            }
        });

        Ok(local_addr)
    }

    /// Stop the server
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            info!("Dify relay stopped");
        }
        self.local_addr = None;
        Ok(())
    }

    /// Check if server is running
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }

    /// Address the server is bound to, while running
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}
