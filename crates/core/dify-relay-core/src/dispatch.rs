//! Upstream request dispatch
//!
//! Issues one blocking call to Dify and folds every outcome, including
//! transport failures, into an [`UpstreamResult`]. Nothing past this
//! boundary returns an error to the caller.

use crate::classify::{
    classify_status, excerpt, extract_answer, extract_conversation_id, is_html_body,
    numbered_section, sniff_text, upstream_error_message, AuthCause, ErrorKind,
    ERROR_EXCERPT_CHARS,
};
use crate::config::RelayConfig;
use crate::mode::RequestMode;
use crate::normalize::UpstreamTarget;
use crate::payload::UpstreamPayload;
use crate::utils::{mask_secret, scrub_message};
use crate::Result;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Outcome of one upstream call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpstreamResult {
    /// 2xx with a JSON body
    Success {
        /// Answer text for the chat window
        answer: String,
        /// Conversation id to send on the next turn
        conversation_id: Option<String>,
        /// Parsed upstream body
        raw: Value,
    },
    /// Non-2xx response that is not an HTML page
    StructuredError {
        /// Upstream status
        http_status: u16,
        /// Category from status and body
        kind: ErrorKind,
        /// 401 root cause, when the status was 401
        cause: Option<AuthCause>,
        /// Upstream message, or a body excerpt when it was not JSON
        message: String,
    },
    /// HTML document where JSON was expected, whatever the status
    HtmlPageError {
        /// Upstream status
        http_status: u16,
    },
    /// Transport failure or a 2xx body that is not JSON
    NetworkError {
        /// Human-readable description
        message: String,
    },
}

impl UpstreamResult {
    /// Whether the call produced an answer
    pub fn is_success(&self) -> bool {
        matches!(self, UpstreamResult::Success { .. })
    }

    /// Status the relay should answer the browser with
    ///
    /// Upstream statuses are passed through, even for an HTML page served
    /// with 200; transport and parse failures are 500.
    pub fn response_status(&self) -> u16 {
        match self {
            UpstreamResult::Success { .. } => 200,
            UpstreamResult::StructuredError { http_status, .. } => *http_status,
            UpstreamResult::HtmlPageError { http_status } => *http_status,
            UpstreamResult::NetworkError { .. } => 500,
        }
    }

    /// Text shown to the person configuring the integration
    pub fn user_message(&self) -> String {
        match self {
            UpstreamResult::Success { answer, .. } => answer.clone(),
            UpstreamResult::StructuredError {
                http_status,
                kind,
                cause,
                message,
            } => structured_message(*http_status, *kind, *cause, message),
            UpstreamResult::HtmlPageError { http_status } => html_message(*http_status),
            UpstreamResult::NetworkError { message } => message.clone(),
        }
    }

    fn network(err: &reqwest::Error) -> Self {
        UpstreamResult::NetworkError {
            message: network_message(err),
        }
    }
}

fn structured_message(
    http_status: u16,
    kind: ErrorKind,
    cause: Option<AuthCause>,
    message: &str,
) -> String {
    if let Some(cause) = cause {
        let headline = match cause.summary() {
            Some(summary) => format!("Authentication failed: {}", summary),
            None => format!("Authentication failed: {}", message),
        };
        return format!(
            "{}{}{}",
            headline,
            numbered_section("Possible causes", cause.causes()),
            numbered_section("How to fix", cause.fixes())
        );
    }

    let headline = match kind {
        ErrorKind::Forbidden => {
            "Permission denied: this API Key is not allowed to perform the operation.".to_string()
        }
        ErrorKind::NotFound => "API endpoint not found.".to_string(),
        ErrorKind::ServerError => "Dify server error: the server failed to process the request.".to_string(),
        ErrorKind::Unauthorized | ErrorKind::Unknown => {
            let reason = StatusCode::from_u16(http_status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Unknown");
            format!("Dify API error (HTTP {} {}): {}", http_status, reason, message)
        }
    };
    format!("{}{}", headline, numbered_section("How to fix", kind.fixes()))
}

fn html_message(http_status: u16) -> String {
    let detail = match http_status {
        401 => " Authentication failed (401).",
        403 => " Access denied (403).",
        404 => " Endpoint not found (404).",
        s if s >= 500 => " The Dify server reported an error.",
        _ => "",
    };
    let mut fixes = vec![
        "Check that the Dify API Base URL is correct",
        "Check that the Dify server is running",
    ];
    if http_status == 404 {
        fixes.push("Check that the URL includes the /v1 API prefix");
        fixes.push("If the URL points at the web console port (e.g. :3000), use the API port instead");
    }
    if http_status == 401 || http_status == 403 {
        fixes.push("Check that the API Key is correct");
    }
    if http_status < 400 {
        fixes.push("A tunnel or reverse proxy may be serving a warning page in front of Dify");
    }
    format!(
        "The Dify server returned an HTML page instead of JSON.{}{}",
        detail,
        numbered_section("How to fix", &fixes)
    )
}

fn network_message(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        return "Network error: the Dify server did not respond before the timeout expired. \
                Check that the server is running and reachable."
            .to_string();
    }
    if err.is_builder() {
        return format!(
            "Request could not be built: {}. Check the URL and API Key for unsupported characters.",
            err
        );
    }
    let text = err.to_string();
    if err.is_connect() || text.to_lowercase().contains("fetch") {
        return format!(
            "Network error: could not reach the Dify server.{}",
            numbered_section(
                "Check that",
                &[
                    "The Dify server is running",
                    "The URL is correct",
                    "Firewall, CORS or network settings allow the connection",
                ]
            )
        );
    }
    format!("Network error: {}", text)
}

/// Fold a status and raw body into an [`UpstreamResult`]
pub fn classify_response(mode: RequestMode, status: StatusCode, body: &str) -> UpstreamResult {
    let http_status = status.as_u16();

    if is_html_body(body) {
        return UpstreamResult::HtmlPageError { http_status };
    }

    if !status.is_success() {
        return match serde_json::from_str::<Value>(body) {
            Ok(json) => {
                let (kind, cause) = classify_status(http_status, &sniff_text(&json));
                UpstreamResult::StructuredError {
                    http_status,
                    kind,
                    cause,
                    message: upstream_error_message(&json).unwrap_or_else(|| json.to_string()),
                }
            }
            Err(_) => UpstreamResult::StructuredError {
                http_status,
                kind: ErrorKind::Unknown,
                cause: None,
                message: excerpt(body, ERROR_EXCERPT_CHARS),
            },
        };
    }

    match serde_json::from_str::<Value>(body) {
        Ok(json) => UpstreamResult::Success {
            answer: extract_answer(mode, &json),
            conversation_id: extract_conversation_id(&json),
            raw: json,
        },
        Err(e) => UpstreamResult::NetworkError {
            message: format!(
                "Dify returned HTTP {} with a body that is not JSON ({}). Response: {}",
                http_status,
                e,
                excerpt(body, ERROR_EXCERPT_CHARS)
            ),
        },
    }
}

/// Sends normalized requests to Dify
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    user_agent: String,
    default_user: String,
}

impl Dispatcher {
    /// Build a dispatcher with its own HTTP client
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.upstream_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(builder.build()?, config))
    }

    /// Build a dispatcher around an existing client
    pub fn with_client(client: reqwest::Client, config: &RelayConfig) -> Self {
        Self {
            client,
            user_agent: config.user_agent.clone(),
            default_user: config.default_user.clone(),
        }
    }

    /// User id sent when the caller supplies none
    pub fn default_user(&self) -> &str {
        &self.default_user
    }

    /// Send one chat turn using the default user
    pub async fn send(
        &self,
        target: &UpstreamTarget,
        mode: RequestMode,
        message: &str,
        conversation_id: Option<&str>,
    ) -> UpstreamResult {
        let payload = UpstreamPayload::new(mode, message, conversation_id, &self.default_user);
        self.dispatch(target, mode, &payload).await
    }

    /// Send a prepared payload and classify the response
    pub async fn dispatch(
        &self,
        target: &UpstreamTarget,
        mode: RequestMode,
        payload: &UpstreamPayload,
    ) -> UpstreamResult {
        let request_id = Uuid::new_v4();
        let span = info_span!("dify_dispatch", %request_id, %mode);
        self.dispatch_inner(target, mode, payload)
            .instrument(span)
            .await
    }

    async fn dispatch_inner(
        &self,
        target: &UpstreamTarget,
        mode: RequestMode,
        payload: &UpstreamPayload,
    ) -> UpstreamResult {
        let url = target.url();
        info!(
            url = %url,
            auth_header = %target.auth_header_name,
            auth_value = %mask_secret(&target.auth_header_value),
            has_conversation = payload.conversation_id().is_some(),
            "Dispatching request to Dify"
        );

        let response = match self
            .client
            .post(&url)
            .header(target.auth_header_name.as_str(), target.auth_header_value.as_str())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, self.user_agent.as_str())
            .json(payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %scrub_message(&e.to_string()), "Dify request failed");
                return UpstreamResult::network(&e);
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(status = status.as_u16(), error = %e, "Failed to read Dify response body");
                return UpstreamResult::network(&e);
            }
        };
        debug!(status = status.as_u16(), body = %scrub_message(&body), "Dify response");

        let result = classify_response(mode, status, &body);
        match &result {
            UpstreamResult::Success { .. } => info!(status = status.as_u16(), "Dify call succeeded"),
            UpstreamResult::HtmlPageError { http_status } => {
                warn!(status = *http_status, "Dify returned an HTML page")
            }
            UpstreamResult::StructuredError { kind, cause, .. } => {
                warn!(status = status.as_u16(), ?kind, ?cause, "Dify rejected the request")
            }
            UpstreamResult::NetworkError { .. } => {
                warn!(status = status.as_u16(), "Dify returned a non-JSON success body")
            }
        }
        result
    }
}
