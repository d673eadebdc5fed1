//! Liveness probe for the collaborator API server

use crate::classify::is_html_body;
use crate::config::RelayConfig;
use crate::normalize::clean_base_url;
use crate::Result;
use serde_json::{json, Value};
use tracing::{info, warn};

/// Header that suppresses the ngrok interstitial page
pub const NGROK_SKIP_HEADER: &str = "ngrok-skip-browser-warning";

/// Result of probing `<server>/health`
#[derive(Debug, Clone, PartialEq)]
pub enum HealthOutcome {
    /// JSON body with `status == "healthy"`
    Healthy(Value),
    /// JSON body reporting any other status
    Unhealthy(Value),
    /// Non-2xx response; body passed through as text
    UpstreamError {
        /// Upstream status
        http_status: u16,
        /// Raw response body
        body: String,
    },
    /// HTML page where JSON was expected
    HtmlPage,
    /// 2xx body that is not JSON
    InvalidJson(String),
    /// Transport failure
    Network(String),
}

impl HealthOutcome {
    /// Whether the server reported itself healthy
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthOutcome::Healthy(_))
    }

    /// Status to answer the browser with
    pub fn response_status(&self) -> u16 {
        match self {
            HealthOutcome::Healthy(_) => 200,
            HealthOutcome::Unhealthy(_) => 503,
            HealthOutcome::UpstreamError { http_status, .. } => *http_status,
            HealthOutcome::HtmlPage | HealthOutcome::InvalidJson(_) | HealthOutcome::Network(_) => 500,
        }
    }

    /// JSON body to answer the browser with
    pub fn into_body(self) -> Value {
        match self {
            HealthOutcome::Healthy(data) | HealthOutcome::Unhealthy(data) => data,
            HealthOutcome::UpstreamError { body, .. } => json!({ "error": body }),
            HealthOutcome::HtmlPage => json!({
                "error": "HTML response received (possibly an ngrok warning page)"
            }),
            HealthOutcome::InvalidJson(message) => {
                json!({ "error": format!("Invalid JSON response: {}", message) })
            }
            HealthOutcome::Network(message) => json!({ "error": message }),
        }
    }
}

/// Classify a health response body
pub fn classify_health(http_status: u16, body: &str) -> HealthOutcome {
    if !(200..300).contains(&http_status) {
        return HealthOutcome::UpstreamError {
            http_status,
            body: body.to_string(),
        };
    }
    if is_html_body(body) {
        return HealthOutcome::HtmlPage;
    }
    match serde_json::from_str::<Value>(body) {
        Ok(data) if data.get("status").and_then(Value::as_str) == Some("healthy") => {
            HealthOutcome::Healthy(data)
        }
        Ok(data) => HealthOutcome::Unhealthy(data),
        Err(e) => HealthOutcome::InvalidJson(e.to_string()),
    }
}

/// Checks whether an API server is up
#[derive(Debug, Clone)]
pub struct HealthProbe {
    client: reqwest::Client,
}

impl HealthProbe {
    /// Build a probe with its own HTTP client
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.upstream_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(builder.build()?))
    }

    /// Build a probe around an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// GET `<server_url>/health`
    pub async fn check(&self, server_url: &str) -> HealthOutcome {
        let url = format!("{}/health", clean_base_url(server_url));
        let response = match self
            .client
            .get(&url)
            .header(NGROK_SKIP_HEADER, "true")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "Health check request failed");
                return HealthOutcome::Network(e.to_string());
            }
        };

        let status = response.status().as_u16();
        let outcome = match response.text().await {
            Ok(body) => classify_health(status, &body),
            Err(e) => HealthOutcome::Network(e.to_string()),
        };
        info!(url = %url, status, healthy = outcome.is_healthy(), "Health check finished");
        outcome
    }
}
