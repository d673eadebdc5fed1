//! Request and response bodies of the relay's HTTP surface

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body accepted by the proxy and answer routes
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    /// Dify API base URL as typed by the user
    #[serde(default)]
    pub url: Option<String>,

    /// Dify app API key as typed by the user
    #[serde(default)]
    pub api_key: Option<String>,

    /// `chatbot`, `workflow` or `completion`
    #[serde(default)]
    pub app_type: Option<String>,

    /// `bearer`, `api-key` or `x-api-key`
    #[serde(default)]
    pub auth_header_type: Option<String>,

    /// Dify-shaped payload built by the chat client
    #[serde(default)]
    pub payload: Value,

    /// Message text when the payload carries none
    #[serde(default)]
    pub message: Option<String>,

    /// Conversation id when the payload carries none
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Chat-window view of a successful call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    /// Answer text
    pub answer: String,
    /// Conversation id to send with the next message
    pub conversation_id: Option<String>,
    /// Mode the call ran in
    pub mode: String,
}

/// Query string of the health probe route
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthQuery {
    /// API server to probe
    pub url: Option<String>,
}

/// Relay's own liveness body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    /// Always `healthy` while the process serves requests
    pub status: String,
    /// Service name
    pub service: String,
    /// Crate version
    pub version: String,
    /// RFC 3339 timestamp
    pub timestamp: String,
}
