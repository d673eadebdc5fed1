//! Route handlers

use crate::server::RelayState;
use crate::types::{AnswerResponse, HealthQuery, LivenessResponse, ProxyRequest};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dify_relay_core::{
    normalize_with, AuthHeaderType, CallerTurn, RelayError, RequestMode, UpstreamPayload,
    UpstreamResult, UpstreamTarget, ValidationError,
};
use tracing::{error, info, warn};

/// Service name reported by the liveness route
pub const SERVICE_NAME: &str = "dify-relay";

/// Error responses rendered as `{ "error": <sentence> }`
#[derive(Debug)]
pub enum ApiError {
    /// Caller input rejected before dispatch
    BadRequest(String),
    /// Request body over the configured limit
    PayloadTooLarge(String),
    /// Upstream call failed; status mirrors the classification
    Upstream {
        /// Status to answer with
        status: u16,
        /// Diagnosis text
        message: String,
    },
    /// Relay-side failure
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            ApiError::Upstream { status, message } => (
                StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                message,
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Validation(e) => e.into(),
            other => {
                error!("RelayError: {}", other);
                ApiError::Internal(other.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge("Request body is too large".to_string())
        } else {
            ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
        }
    }
}

impl From<UpstreamResult> for ApiError {
    fn from(result: UpstreamResult) -> Self {
        ApiError::Upstream {
            status: result.response_status(),
            message: result.user_message(),
        }
    }
}

/// Normalized call ready for dispatch
struct PreparedCall {
    target: UpstreamTarget,
    mode: RequestMode,
    payload: UpstreamPayload,
}

fn prepare(state: &RelayState, request: ProxyRequest) -> Result<PreparedCall, ApiError> {
    let url = request.url.unwrap_or_default();
    let api_key = request.api_key.unwrap_or_default();
    if url.is_empty() || api_key.is_empty() {
        return Err(ValidationError::MissingCredentials.into());
    }

    let mode = RequestMode::parse_optional(request.app_type.as_deref())?;
    let auth = AuthHeaderType::parse_optional(request.auth_header_type.as_deref())?;
    let target = normalize_with(&url, &api_key, mode, auth)?;

    let turn = CallerTurn::from_payload(
        &request.payload,
        request.message.as_deref(),
        request.conversation_id.as_deref(),
    )?;
    let payload = turn.into_payload(mode, &state.config.default_user);

    Ok(PreparedCall {
        target,
        mode,
        payload,
    })
}

async fn run(
    state: &RelayState,
    body: Result<Json<ProxyRequest>, JsonRejection>,
) -> Result<(RequestMode, UpstreamResult), ApiError> {
    let Json(request) = body?;
    let call = prepare(state, request).map_err(|e| {
        warn!("Rejected relay request: {:?}", e);
        e
    })?;
    let result = state
        .dispatcher
        .dispatch(&call.target, call.mode, &call.payload)
        .await;
    Ok((call.mode, result))
}

/// `POST /api/dify` and `/proxy/dify`: raw upstream body on success
pub async fn proxy_handler(
    State(state): State<RelayState>,
    body: Result<Json<ProxyRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    match run(&state, body).await? {
        (_, UpstreamResult::Success { raw, .. }) => Ok(Json(raw).into_response()),
        (_, failure) => Err(failure.into()),
    }
}

/// `POST /api/dify/answer`: answer text and conversation id
pub async fn answer_handler(
    State(state): State<RelayState>,
    body: Result<Json<ProxyRequest>, JsonRejection>,
) -> Result<Json<AnswerResponse>, ApiError> {
    match run(&state, body).await? {
        (
            mode,
            UpstreamResult::Success {
                answer,
                conversation_id,
                ..
            },
        ) => Ok(Json(AnswerResponse {
            answer,
            conversation_id,
            mode: mode.to_string(),
        })),
        (_, failure) => Err(failure.into()),
    }
}

/// `GET /api/health?url=`: probe an API server's `/health`
pub async fn health_probe_handler(
    State(state): State<RelayState>,
    Query(query): Query<HealthQuery>,
) -> Result<Response, ApiError> {
    let url = match query.url.filter(|u| !u.trim().is_empty()) {
        Some(url) => url,
        None => return Err(ApiError::BadRequest("URL parameter is required".to_string())),
    };
    info!("Health probe for {}", url);

    let outcome = state.probe.check(&url).await;
    let status = StatusCode::from_u16(outcome.response_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    Ok((status, Json(outcome.into_body())).into_response())
}

/// `GET /health`: the relay's own liveness
pub async fn health_check() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
