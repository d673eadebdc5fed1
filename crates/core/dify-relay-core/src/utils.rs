//! Utility functions and helpers

pub mod logger;
pub mod redact;

pub use self::logger::init_logging;
pub use self::redact::{mask_secret, scrub_message};
