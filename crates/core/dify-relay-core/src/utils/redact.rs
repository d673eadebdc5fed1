//! Redaction of credentials before they reach the logs

use once_cell::sync::Lazy;
use regex::Regex;

/// Longest upstream body excerpt written to the logs
const MAX_LOGGED_CHARS: usize = 2000;

static SCRUB_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"(?i)bearer\s+[A-Za-z0-9._~+/=-]+").expect("valid regex"),
            "Bearer REDACTED",
        ),
        (
            Regex::new(r"\b(app|sk)-[A-Za-z0-9]{8,}").expect("valid regex"),
            "$1-REDACTED",
        ),
        (
            Regex::new(r"(?i)api[_-]?key\s*[:=]?\s*[A-Za-z0-9-_]{12,}").expect("valid regex"),
            "api_key=REDACTED",
        ),
    ]
});

/// Mask a secret for logging: first 10 and last 5 characters of long values
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    match chars.len() {
        0 => "EMPTY".to_string(),
        n if n > 15 => {
            let head: String = chars[..10].iter().collect();
            let tail: String = chars[n - 5..].iter().collect();
            format!("{}...{}", head, tail)
        }
        n => {
            let head: String = chars[..n / 4].iter().collect();
            format!("{}...", head)
        }
    }
}

/// Truncate and redact an upstream body before logging it
pub fn scrub_message(message: &str) -> String {
    let mut s: String = message.chars().take(MAX_LOGGED_CHARS).collect();
    for (re, rep) in SCRUB_PATTERNS.iter() {
        s = re.replace_all(&s, *rep).into_owned();
    }
    s
}
