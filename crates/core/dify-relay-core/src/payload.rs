//! Outbound request bodies and extraction of the caller's chat turn

use crate::mode::RequestMode;
use crate::ValidationError;
use serde::Serialize;
use serde_json::{Map, Value};

/// Upstream response delivery; the relay always reads whole bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Single JSON document once generation finishes
    #[default]
    Blocking,
}

/// Body for `/chat-messages` and `/completion-messages`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatPayload {
    /// App variables; empty unless the caller supplied some
    pub inputs: Map<String, Value>,
    /// Free-text user message
    pub query: String,
    /// Always blocking
    pub response_mode: ResponseMode,
    /// Conversation to continue; `null` on the first turn
    pub conversation_id: Option<String>,
    /// End-user identifier
    pub user: String,
}

/// Body for `/workflows/run`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowPayload {
    /// Workflow inputs; the message travels in `inputs.query`
    pub inputs: Map<String, Value>,
    /// Always blocking
    pub response_mode: ResponseMode,
    /// End-user identifier
    pub user: String,
}

/// Mode-specific outbound body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UpstreamPayload {
    /// Chatbot or Completion shape
    Chat(ChatPayload),
    /// Workflow shape
    Workflow(WorkflowPayload),
}

impl UpstreamPayload {
    /// Build the payload for `mode` with empty extra inputs
    pub fn new(
        mode: RequestMode,
        message: &str,
        conversation_id: Option<&str>,
        user: &str,
    ) -> Self {
        Self::with_inputs(mode, message, conversation_id, user, Map::new())
    }

    /// Build the payload for `mode`, carrying caller-supplied inputs
    pub fn with_inputs(
        mode: RequestMode,
        message: &str,
        conversation_id: Option<&str>,
        user: &str,
        mut inputs: Map<String, Value>,
    ) -> Self {
        match mode {
            RequestMode::Workflow => {
                inputs.insert("query".to_string(), Value::String(message.to_string()));
                UpstreamPayload::Workflow(WorkflowPayload {
                    inputs,
                    response_mode: ResponseMode::Blocking,
                    user: user.to_string(),
                })
            }
            RequestMode::Chatbot | RequestMode::Completion => UpstreamPayload::Chat(ChatPayload {
                inputs,
                query: message.to_string(),
                response_mode: ResponseMode::Blocking,
                conversation_id: conversation_id.map(str::to_string),
                user: user.to_string(),
            }),
        }
    }

    /// Conversation id carried by this payload, if any
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            UpstreamPayload::Chat(chat) => chat.conversation_id.as_deref(),
            UpstreamPayload::Workflow(_) => None,
        }
    }
}

/// One user turn as sent by the browser
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallerTurn {
    /// Message text
    pub message: String,
    /// Conversation id from the previous successful turn
    pub conversation_id: Option<String>,
    /// End-user identifier, if the caller set one
    pub user: Option<String>,
    /// Extra app inputs
    pub inputs: Map<String, Value>,
}

impl CallerTurn {
    /// Pull a turn out of a loosely shaped caller payload
    ///
    /// The message comes from `payload.query`, then `payload.inputs.query`,
    /// then `message`. An empty conversation id counts as absent.
    pub fn from_payload(
        payload: &Value,
        message: Option<&str>,
        conversation_id: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let inputs = payload
            .get("inputs")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let message = non_blank(payload.get("query").and_then(Value::as_str))
            .or_else(|| non_blank(inputs.get("query").and_then(Value::as_str)))
            .or_else(|| non_blank(message))
            .ok_or(ValidationError::MissingMessage)?
            .to_string();

        let conversation_id = non_blank(payload.get("conversation_id").and_then(Value::as_str))
            .or_else(|| non_blank(conversation_id))
            .map(str::to_string);

        let user = non_blank(payload.get("user").and_then(Value::as_str)).map(str::to_string);

        Ok(Self {
            message,
            conversation_id,
            user,
            inputs,
        })
    }

    /// Build the outbound payload for `mode`
    pub fn into_payload(self, mode: RequestMode, default_user: &str) -> UpstreamPayload {
        let user = self.user.unwrap_or_else(|| default_user.to_string());
        UpstreamPayload::with_inputs(
            mode,
            &self.message,
            self.conversation_id.as_deref(),
            &user,
            self.inputs,
        )
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}
