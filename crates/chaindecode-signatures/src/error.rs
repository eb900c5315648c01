//! Errors from the external signature lookup.

use thiserror::Error;

/// Signature lookup failures. All of them degrade to "signature unknown".
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("lookup timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("lookup service returned status {0}")]
    Status(u16),

    #[error("rate limited by {service}")]
    RateLimited { service: String },
}
