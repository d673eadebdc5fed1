//! Dify Relay Core
//!
//! Server-side half of a browser chat client for Dify. It includes:
//!
//! - Normalization of hand-typed base URLs and API keys into a canonical target
//! - Mode-specific payloads for chat, workflow and completion apps
//! - A dispatcher that classifies every upstream outcome into a tagged result
//! - Diagnosis of Dify error responses into actionable remediation text
//! - A liveness probe for the collaborator API server
//!
//! # Example
//!
//! ```no_run
//! use dify_relay_core::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = RelayConfig::default();
//!     let dispatcher = Dispatcher::new(&config)?;
//!     let target = normalize("https://dify.example.com", "app-xxxxxxxxxxxx", RequestMode::Chatbot)?;
//!     let result = dispatcher.send(&target, RequestMode::Chatbot, "Hello", None).await;
//!     println!("{}", result.user_message());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod classify;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod health;
pub mod mode;
pub mod normalize;
pub mod payload;
pub mod utils;

// Re-export main types
pub use classify::{AuthCause, ErrorKind};
pub use config::{get_env_bool, get_env_int, get_env_or, load_env, load_env_from_path, RelayConfig};
pub use dispatch::{classify_response, Dispatcher, UpstreamResult};
pub use error::{RelayError, Result, ValidationError};
pub use health::{HealthOutcome, HealthProbe};
pub use mode::{AuthHeaderType, RequestMode};
pub use normalize::{clean_api_key, clean_base_url, normalize, normalize_with, UpstreamTarget};
pub use payload::{CallerTurn, UpstreamPayload};
pub use utils::{init_logging, mask_secret, scrub_message};
