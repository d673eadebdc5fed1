//! URL and API key normalization
//!
//! Turns the base URL and API key a person typed (or pasted from the Dify
//! console, often with stray whitespace and punctuation) into a canonical
//! upstream target. The path heuristics decide whether the `/v1` API prefix
//! still has to be added; an endpoint suffix already present in the URL
//! path always wins over them.

use crate::mode::{AuthHeaderType, RequestMode};
use crate::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Shortest API key accepted after whitespace removal
pub const MIN_KEY_LEN: usize = 10;

/// Shortest acceptable `Authorization` header value
const MIN_AUTH_HEADER_LEN: usize = 15;

/// API version prefix inserted when the URL carries no path
const DEFAULT_API_VERSION: &str = "/v1";

static VERSIONED_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"/v\d+$").expect("valid regex"));
static PORT_WITH_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r":\d+/").expect("valid regex"));
static PORT_TAIL: Lazy<Regex> = Lazy::new(|| Regex::new(r":\d+$").expect("valid regex"));

/// Fully resolved upstream call target
///
/// Recomputed for every call and never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    /// Scheme, host, port and any API prefix; no trailing `/ , ;` or whitespace
    pub base_url: String,
    /// Endpoint path, always starting with `/`
    pub endpoint_path: String,
    /// Credential header name
    pub auth_header_name: String,
    /// Credential header value
    pub auth_header_value: String,
}

impl UpstreamTarget {
    /// Full URL to POST to
    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, self.endpoint_path)
    }
}

impl fmt::Debug for UpstreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpstreamTarget")
            .field("base_url", &self.base_url)
            .field("endpoint_path", &self.endpoint_path)
            .field("auth_header_name", &self.auth_header_name)
            .field(
                "auth_header_value",
                &crate::utils::redact::mask_secret(&self.auth_header_value),
            )
            .finish()
    }
}

/// Remove every whitespace character from a key, including internal ones
pub fn clean_api_key(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Trim a base URL and strip trailing commas, semicolons, whitespace and slashes
///
/// Idempotent: `clean_base_url(&clean_base_url(x)) == clean_base_url(x)`.
pub fn clean_base_url(raw: &str) -> String {
    raw.trim()
        .trim_end_matches(|c: char| c == ',' || c == ';' || c == '/' || c.is_whitespace())
        .to_string()
}

/// Normalize with the default `Authorization: Bearer` header
pub fn normalize(
    raw_base_url: &str,
    raw_api_key: &str,
    mode: RequestMode,
) -> Result<UpstreamTarget, ValidationError> {
    normalize_with(raw_base_url, raw_api_key, mode, AuthHeaderType::Bearer)
}

/// Normalize a raw base URL and API key into an [`UpstreamTarget`]
pub fn normalize_with(
    raw_base_url: &str,
    raw_api_key: &str,
    mode: RequestMode,
    auth: AuthHeaderType,
) -> Result<UpstreamTarget, ValidationError> {
    let key = clean_api_key(raw_api_key);
    if key.is_empty() {
        return Err(ValidationError::EmptyKey);
    }
    let key_len = key.chars().count();
    if key_len < MIN_KEY_LEN {
        return Err(ValidationError::KeyTooShort { len: key_len });
    }

    let auth_header_value = auth.header_value(&key);
    if auth == AuthHeaderType::Bearer
        && (!auth_header_value.starts_with("Bearer ")
            || auth_header_value.len() < MIN_AUTH_HEADER_LEN)
    {
        return Err(ValidationError::MalformedAuthHeader);
    }

    let url = clean_base_url(raw_base_url);
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ValidationError::InvalidUrl { url });
    }

    let (base_url, endpoint_path) = resolve_endpoint(&url, mode.endpoint_suffix());

    Ok(UpstreamTarget {
        base_url,
        endpoint_path,
        auth_header_name: auth.header_name().to_string(),
        auth_header_value,
    })
}

/// Split a cleaned URL into base and endpoint, inferring `/v1` when needed
fn resolve_endpoint(url: &str, suffix: &str) -> (String, String) {
    let path_start = path_start(url);
    if let Some(idx) = url[path_start..].find(suffix).map(|i| path_start + i) {
        let base = url[..idx].trim_end_matches('/');
        return (base.to_string(), url[base.len()..].to_string());
    }

    let needs_version = if VERSIONED_TAIL.is_match(url) || PORT_WITH_PATH.is_match(url) {
        false
    } else if PORT_TAIL.is_match(url) {
        true
    } else {
        path_start == url.len()
    };

    let base = if needs_version {
        format!("{}{}", url, DEFAULT_API_VERSION)
    } else {
        url.to_string()
    };
    (base, suffix.to_string())
}

/// Byte offset of the first `/` after `scheme://host[:port]`, or the URL length
fn path_start(url: &str) -> usize {
    let authority = url.find("://").map_or(0, |i| i + 3);
    url[authority..]
        .find('/')
        .map_or(url.len(), |i| authority + i)
}
