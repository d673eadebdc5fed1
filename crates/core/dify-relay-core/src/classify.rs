//! Classification of upstream responses
//!
//! Dify reports most failures as JSON with a `message` field, but the exact
//! wording is all there is to tell a bad header from an unpublished app.
//! The 401 rules below are an ordered table: the first rule with a matching
//! substring wins.

use crate::mode::RequestMode;
use serde::Serialize;
use serde_json::Value;

/// Longest body excerpt kept when an error body is not JSON
pub const ERROR_EXCERPT_CHARS: usize = 200;

/// Workflow output keys tried in order before dumping the whole object
pub const WORKFLOW_OUTPUT_KEYS: [&str; 5] = ["text", "answer", "result", "output", "response"];

/// Coarse failure category derived from status and body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credential rejected
    Unauthorized,
    /// Caller not allowed (permissions or network ACL)
    Forbidden,
    /// Endpoint does not exist
    NotFound,
    /// Upstream internal failure
    ServerError,
    /// Anything else
    Unknown,
}

/// Likely root cause of a 401, sniffed from the upstream message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthCause {
    /// Authorization header missing or malformed
    BadAuthHeader,
    /// Key invalid/expired or the app is not published
    BadKeyOrUnpublished,
    /// IP/domain allow-list or CORS rejected the relay
    NetworkAcl,
    /// Workflow exists but is not published
    WorkflowNotPublished,
    /// No rule matched
    Generic,
}

struct AuthRule {
    needles: &'static [&'static str],
    cause: AuthCause,
}

const AUTH_RULES: &[AuthRule] = &[
    AuthRule {
        needles: &["authorization", "bearer", "token", "header"],
        cause: AuthCause::BadAuthHeader,
    },
    AuthRule {
        needles: &["invalid", "expired", "unauthorized", "app unavailable"],
        cause: AuthCause::BadKeyOrUnpublished,
    },
    AuthRule {
        needles: &["ip", "domain", "whitelist", "forbidden", "cors"],
        cause: AuthCause::NetworkAcl,
    },
    AuthRule {
        needles: &["workflow", "not published"],
        cause: AuthCause::WorkflowNotPublished,
    },
];

impl AuthCause {
    /// Category this cause reports under
    pub fn kind(self) -> ErrorKind {
        match self {
            AuthCause::NetworkAcl => ErrorKind::Forbidden,
            _ => ErrorKind::Unauthorized,
        }
    }

    /// One-line summary; `None` for [`AuthCause::Generic`], which echoes upstream
    pub fn summary(self) -> Option<&'static str> {
        match self {
            AuthCause::BadAuthHeader => Some("the Authorization header is not valid."),
            AuthCause::BadKeyOrUnpublished => {
                Some("the API Key is invalid or the app has not been published.")
            }
            AuthCause::NetworkAcl => Some("the Dify server's access restrictions blocked the request."),
            AuthCause::WorkflowNotPublished => Some("the workflow has not been published."),
            AuthCause::Generic => None,
        }
    }

    /// Likely root causes, most probable first
    pub fn causes(self) -> &'static [&'static str] {
        match self {
            AuthCause::BadAuthHeader => &[
                "The API Key format may be wrong",
                "The Authorization header format may differ from what the Dify server expects",
                "The API Key may contain invisible special characters",
            ],
            AuthCause::BadKeyOrUnpublished => &[
                "The API Key has expired or was deleted",
                "The Dify application is not in the 'Published' state",
                "The API Key belongs to a different application",
                "The workflow has not been published",
            ],
            AuthCause::NetworkAcl => &[
                "The Dify server only accepts specific IPs or domains",
                "The relay server's IP is not on the allow-list",
                "CORS settings are incorrect",
                "A firewall is blocking the request",
            ],
            AuthCause::WorkflowNotPublished => &[
                "The workflow in use has not been published",
                "The workflow contains errors",
            ],
            AuthCause::Generic => &[
                "The Dify API Base URL may be wrong",
                "The API Key may be wrong or expired",
                "The Dify server may be misconfigured",
                "There may be a network connectivity problem",
            ],
        }
    }

    /// Remediation steps
    pub fn fixes(self) -> &'static [&'static str] {
        match self {
            AuthCause::BadAuthHeader => &[
                "Issue a new API Key in the Dify dashboard",
                "Copy and paste the API Key instead of typing it",
                "Check for spaces before or after the API Key",
                "Self-hosted Dify servers may use a different auth header type",
            ],
            AuthCause::BadKeyOrUnpublished => &[
                "Check that the application is 'Published' in the Dify dashboard",
                "Check that the workflow is published",
                "Issue a new API Key",
                "Check that the API Key is linked to the right application",
            ],
            AuthCause::NetworkAcl => &[
                "Ask the Dify server administrator to allow the relay server's IP range",
                "Allow the relay server's IP in the firewall settings",
                "Check the Dify server's CORS settings",
                "Temporarily lift the IP restriction and test again",
            ],
            AuthCause::WorkflowNotPublished => &[
                "Publish the workflow in the Dify dashboard",
                "Check the workflow for errors",
            ],
            AuthCause::Generic => &[
                "Check the Dify API Base URL (e.g. http://your-server.com/v1)",
                "Check that the URL ends with /v1",
                "Check that the Dify server is running",
                "Inspect the actual request in the browser's network tab",
                "Check the Dify server logs",
            ],
        }
    }
}

impl ErrorKind {
    /// Remediation steps for non-401 statuses
    pub fn fixes(self) -> &'static [&'static str] {
        match self {
            ErrorKind::Forbidden => &[
                "Check that the API Key has the required permissions",
                "The Dify server may only accept specific IPs or domains",
            ],
            ErrorKind::NotFound => &[
                "Check the Dify API Base URL (e.g. http://your-server.com/v1)",
                "Check that the URL ends with /v1",
                "Check that the endpoint path is correct (/chat-messages, /workflows/run, /completion-messages)",
            ],
            ErrorKind::ServerError => &[
                "Try again in a moment",
                "Check the Dify server logs",
                "Contact the Dify server administrator",
            ],
            ErrorKind::Unauthorized | ErrorKind::Unknown => &[],
        }
    }
}

/// Pick the first rule whose needle occurs in the lower-cased message
pub fn diagnose_unauthorized(upstream_message: &str) -> AuthCause {
    let lower = upstream_message.to_lowercase();
    AUTH_RULES
        .iter()
        .find(|rule| rule.needles.iter().any(|needle| lower.contains(needle)))
        .map(|rule| rule.cause)
        .unwrap_or(AuthCause::Generic)
}

/// Map a failed status (and, for 401, the message) to a kind and cause
pub fn classify_status(status: u16, upstream_message: &str) -> (ErrorKind, Option<AuthCause>) {
    match status {
        401 => {
            let cause = diagnose_unauthorized(upstream_message);
            (cause.kind(), Some(cause))
        }
        403 => (ErrorKind::Forbidden, None),
        404 => (ErrorKind::NotFound, None),
        500 => (ErrorKind::ServerError, None),
        _ => (ErrorKind::Unknown, None),
    }
}

/// True when the body is an HTML document rather than an API response
pub fn is_html_body(body: &str) -> bool {
    let head: String = body
        .trim_start()
        .chars()
        .take(16)
        .collect::<String>()
        .to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

/// Upstream error text: `message`, then `error` (string or `error.message`)
pub fn upstream_error_message(body: &Value) -> Option<String> {
    if let Some(message) = body.get("message").and_then(Value::as_str) {
        if !message.is_empty() {
            return Some(message.to_string());
        }
    }
    match body.get("error") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Object(obj)) => obj
            .get("message")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

/// Text the 401 rules are matched against: message, error, then code
pub fn sniff_text(body: &Value) -> String {
    upstream_error_message(body)
        .or_else(|| body.get("code").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_default()
}

/// First `limit` characters of a body
pub fn excerpt(body: &str, limit: usize) -> String {
    body.chars().take(limit).collect()
}

/// Answer text of a successful response
pub fn extract_answer(mode: RequestMode, body: &Value) -> String {
    match mode {
        RequestMode::Chatbot | RequestMode::Completion => body
            .get("answer")
            .and_then(truthy_text)
            .unwrap_or_default(),
        RequestMode::Workflow => {
            let outputs = body
                .get("outputs")
                .filter(|v| !v.is_null())
                .or_else(|| body.pointer("/data/outputs").filter(|v| !v.is_null()));
            match outputs {
                Some(outputs) => WORKFLOW_OUTPUT_KEYS
                    .iter()
                    .find_map(|key| outputs.get(*key).and_then(truthy_text))
                    .unwrap_or_else(|| outputs.to_string()),
                None => String::new(),
            }
        }
    }
}

/// Conversation id to reuse on the next turn
pub fn extract_conversation_id(body: &Value) -> Option<String> {
    body.get("conversation_id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn truthy_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
        _ => None,
    }
}

/// Render "Possible causes" / "How to fix" numbered lists
pub(crate) fn numbered_section(title: &str, items: &[&str]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item))
        .collect();
    format!("\n\n{}:\n{}", title, lines.join("\n"))
}
