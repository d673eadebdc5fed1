//! Upstream application shapes and credential header styles

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which Dify application shape a configured integration targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMode {
    /// Chat app (`/chat-messages`)
    #[default]
    Chatbot,
    /// Workflow app (`/workflows/run`)
    Workflow,
    /// Text generator app (`/completion-messages`)
    Completion,
}

impl RequestMode {
    /// Endpoint suffix appended to the API base
    pub fn endpoint_suffix(self) -> &'static str {
        match self {
            RequestMode::Chatbot => "/chat-messages",
            RequestMode::Workflow => "/workflows/run",
            RequestMode::Completion => "/completion-messages",
        }
    }

    /// Wire name used by the inbound `appType` field
    pub fn as_str(self) -> &'static str {
        match self {
            RequestMode::Chatbot => "chatbot",
            RequestMode::Workflow => "workflow",
            RequestMode::Completion => "completion",
        }
    }

    /// Parse an optional `appType`, defaulting to [`RequestMode::Chatbot`]
    pub fn parse_optional(raw: Option<&str>) -> Result<Self, ValidationError> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => s.parse(),
            None => Ok(RequestMode::default()),
        }
    }
}

impl FromStr for RequestMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chatbot" | "chat" => Ok(RequestMode::Chatbot),
            "workflow" => Ok(RequestMode::Workflow),
            "completion" => Ok(RequestMode::Completion),
            other => Err(ValidationError::UnknownMode(other.to_string())),
        }
    }
}

impl fmt::Display for RequestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the API key is presented to the upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AuthHeaderType {
    /// `Authorization: Bearer <key>`
    #[default]
    Bearer,
    /// `api-key: <key>`
    ApiKey,
    /// `X-API-Key: <key>`
    XApiKey,
}

impl AuthHeaderType {
    /// Header name carrying the credential
    pub fn header_name(self) -> &'static str {
        match self {
            AuthHeaderType::Bearer => "Authorization",
            AuthHeaderType::ApiKey => "api-key",
            AuthHeaderType::XApiKey => "X-API-Key",
        }
    }

    /// Header value for an already-cleaned key
    pub fn header_value(self, clean_key: &str) -> String {
        match self {
            AuthHeaderType::Bearer => format!("Bearer {}", clean_key),
            AuthHeaderType::ApiKey | AuthHeaderType::XApiKey => clean_key.to_string(),
        }
    }

    /// Parse an optional `authHeaderType`, defaulting to [`AuthHeaderType::Bearer`]
    pub fn parse_optional(raw: Option<&str>) -> Result<Self, ValidationError> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => s.parse(),
            None => Ok(AuthHeaderType::default()),
        }
    }
}

impl FromStr for AuthHeaderType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bearer" => Ok(AuthHeaderType::Bearer),
            "api-key" => Ok(AuthHeaderType::ApiKey),
            "x-api-key" => Ok(AuthHeaderType::XApiKey),
            other => Err(ValidationError::UnknownAuthHeaderType(other.to_string())),
        }
    }
}
