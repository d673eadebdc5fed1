//! Error types for the Dify relay core

use thiserror::Error;

/// Caller input that cannot be turned into an upstream call.
///
/// These never reach the network: normalization rejects them up front and
/// the web surface maps every variant to `400 Bad Request`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// URL or API key missing from the inbound request
    #[error("URL and API Key are required.")]
    MissingCredentials,

    /// API key is empty once whitespace is removed
    #[error("API Key is empty. Enter the API Key issued by Dify.")]
    EmptyKey,

    /// API key is shorter than any key Dify issues
    #[error("API Key is too short ({len} characters). Check the API Key issued by Dify.")]
    KeyTooShort {
        /// Length after whitespace removal
        len: usize,
    },

    /// Constructed Authorization header failed the sanity check
    #[error("API Key format is invalid. Check the API Key issued by Dify.")]
    MalformedAuthHeader,

    /// Base URL is empty or not an http(s) URL
    #[error("Dify API Base URL is invalid: '{url}'. Enter a URL starting with http:// or https://.")]
    InvalidUrl {
        /// The cleaned URL that was rejected
        url: String,
    },

    /// `appType` is not one of chatbot, workflow, completion
    #[error("Unknown app type '{0}'. Use chatbot, workflow or completion.")]
    UnknownMode(String),

    /// `authHeaderType` is not one of bearer, api-key, x-api-key
    #[error("Unknown auth header type '{0}'. Use bearer, api-key or x-api-key.")]
    UnknownAuthHeaderType(String),

    /// Payload carries no query text
    #[error("Message is required: set payload.query, payload.inputs.query or message.")]
    MissingMessage,
}

/// Main error type for relay operations
#[derive(Debug, Error)]
pub enum RelayError {
    /// Caller input rejected before dispatch
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Network/HTTP error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Convenient Result type using RelayError
pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        RelayError::Config(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        RelayError::Other(msg.into())
    }
}
