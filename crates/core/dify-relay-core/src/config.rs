//! Configuration management and environment variable loading

use crate::{RelayError, Result};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Browser user agent sent upstream; some Dify deployments reject anything else.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// User id reported to Dify when the caller supplies none
pub const DEFAULT_USER: &str = "web-ui-user";

/// Load environment variables from .env file
///
/// A missing file is not an error; the process environment is used as-is.
///
/// # Example
///
/// ```no_run
/// use dify_relay_core::load_env;
///
/// load_env().ok();
/// let port = std::env::var("DIFY_RELAY_PORT").unwrap_or_default();
/// ```
pub fn load_env() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(path) => {
            tracing::info!("Loaded environment from: {}", path.display());
            Ok(())
        }
        Err(dotenvy::Error::LineParse(line, pos)) => Err(RelayError::config(format!(
            "Failed to parse .env file at line {}, position {}",
            line, pos
        ))),
        Err(dotenvy::Error::Io(_)) => {
            tracing::warn!("No .env file found - using system environment variables only");
            Ok(())
        }
        Err(e) => Err(RelayError::config(format!("Failed to load .env file: {}", e))),
    }
}

/// Load environment variables from a specific file
pub fn load_env_from_path<P: AsRef<Path>>(path: P) -> Result<()> {
    match dotenvy::from_path(path.as_ref()) {
        Ok(_) => {
            tracing::info!("Loaded environment from: {}", path.as_ref().display());
            Ok(())
        }
        Err(e) => Err(RelayError::config(format!(
            "Failed to load {} environment file: {}",
            path.as_ref().display(),
            e
        ))),
    }
}

/// Get optional environment variable with default
pub fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get environment variable as boolean
pub fn get_env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|v| parse_bool(&v))
        .unwrap_or(default)
}

/// Get environment variable as integer
pub fn get_env_int<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Relay server and dispatcher configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Bind host
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Attach the permissive CORS layer
    pub enable_cors: bool,

    /// Preflight cache lifetime
    pub cors_max_age: Duration,

    /// Maximum inbound request body size
    pub max_body_bytes: usize,

    /// Per-call upstream timeout; `None` waits indefinitely
    pub upstream_timeout: Option<Duration>,

    /// User-Agent header sent upstream
    pub user_agent: String,

    /// Dify `user` field when the caller omits one
    pub default_user: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            enable_cors: true,
            cors_max_age: Duration::from_secs(86_400),
            max_body_bytes: 2 * 1024 * 1024,
            upstream_timeout: Some(Duration::from_secs(120)),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_user: DEFAULT_USER.to_string(),
        }
    }
}

impl RelayConfig {
    /// Build configuration from `DIFY_RELAY_*` environment variables
    ///
    /// `DIFY_RELAY_UPSTREAM_TIMEOUT_SECS=0` disables the upstream timeout.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let timeout_secs = get_env_int(
            "DIFY_RELAY_UPSTREAM_TIMEOUT_SECS",
            defaults.upstream_timeout.map(|d| d.as_secs()).unwrap_or(0),
        );
        Self {
            host: get_env_or("DIFY_RELAY_HOST", &defaults.host),
            port: get_env_int("DIFY_RELAY_PORT", defaults.port),
            enable_cors: get_env_bool("DIFY_RELAY_ENABLE_CORS", defaults.enable_cors),
            cors_max_age: defaults.cors_max_age,
            max_body_bytes: get_env_int("DIFY_RELAY_MAX_BODY_BYTES", defaults.max_body_bytes),
            upstream_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            user_agent: get_env_or("DIFY_RELAY_USER_AGENT", &defaults.user_agent),
            default_user: get_env_or("DIFY_RELAY_DEFAULT_USER", &defaults.default_user),
        }
    }

    /// Socket address string for binding
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
