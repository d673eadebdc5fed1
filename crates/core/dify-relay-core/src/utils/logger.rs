//! Logging utilities

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when neither `RUST_LOG` nor `DIFY_RELAY_LOG_LEVEL` is set
const DEFAULT_LEVEL: &str = "info";

/// Initialize the global logging system
///
/// `RUST_LOG` wins over `DIFY_RELAY_LOG_LEVEL`. Calling this more than once
/// keeps the first subscriber.
pub fn init_logging() {
    let level =
        std::env::var("DIFY_RELAY_LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LEVEL.to_string());
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into());

    let result = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .try_init();
    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}
