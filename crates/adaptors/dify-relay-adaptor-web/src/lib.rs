//! Web adaptor for the Dify relay
//!
//! Routes:
//! - `POST /api/dify`, `POST /proxy/dify`: normalize, dispatch, return the raw Dify body
//! - `POST /api/dify/answer`: same call, returns `{ answer, conversationId, mode }`
//! - `GET /api/health?url=`: probe an API server's `/health`
//! - `GET /health`: relay liveness

#![warn(missing_docs)]

pub mod handlers;
pub mod server;
pub mod types;

pub use handlers::ApiError;
pub use server::{build_router, RelayServer, RelayState};
pub use types::{AnswerResponse, HealthQuery, LivenessResponse, ProxyRequest};
