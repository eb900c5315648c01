//! External selector lookup.
//!
//! [`FourByteClient`] talks to a 4byte.directory-compatible service;
//! [`StaticLookup`] answers from a fixed table.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::error::LookupError;

/// Default public lookup service.
pub const DEFAULT_LOOKUP_URL: &str = "https://www.4byte.directory";

/// Maps a 4-byte selector to at most one human-readable signature.
#[async_trait]
pub trait SignatureLookup: Send + Sync {
    async fn lookup(&self, selector: [u8; 4]) -> Result<Option<String>, LookupError>;
}

// ─── 4byte.directory ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct FourByteResponse {
    results: Vec<FourByteResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FourByteResult {
    pub id: u64,
    pub text_signature: String,
    pub hex_signature: String,
    pub bytes_signature: String,
}

/// Earliest-registered match; later registrations of a selector are usually collisions.
pub fn pick_signature(results: &[FourByteResult]) -> Option<String> {
    results
        .iter()
        .min_by_key(|r| r.id)
        .map(|r| r.text_signature.clone())
}

/// HTTP client for `GET {base}/api/v1/signatures/?hex_signature=0x…`.
pub struct FourByteClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl FourByteClient {
    /// Build a client with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("chaindecode/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn url(&self, selector: [u8; 4]) -> String {
        format!(
            "{}/api/v1/signatures/?hex_signature=0x{}",
            self.base_url,
            hex::encode(selector)
        )
    }
}

#[async_trait]
impl SignatureLookup for FourByteClient {
    async fn lookup(&self, selector: [u8; 4]) -> Result<Option<String>, LookupError> {
        let url = self.url(selector);
        debug!(url = %url, "looking up selector");

        let resp = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                LookupError::Timeout {
                    ms: self.timeout.as_millis() as u64,
                }
            } else {
                LookupError::Http(e)
            }
        })?;

        match resp.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(LookupError::RateLimited {
                    service: self.base_url.clone(),
                })
            }
            s if !s.is_success() => return Err(LookupError::Status(s.as_u16())),
            _ => {}
        }

        let body: FourByteResponse = resp.json().await?;
        Ok(pick_signature(&body.results))
    }
}

// ─── Static table ────────────────────────────────────────────────────────────

/// Fixed selector table. Useful offline and as a deterministic test double.
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    entries: HashMap<[u8; 4], String>,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `selector` to `signature`.
    pub fn with(mut self, selector: [u8; 4], signature: impl Into<String>) -> Self {
        self.entries.insert(selector, signature.into());
        self
    }
}

#[async_trait]
impl SignatureLookup for StaticLookup {
    async fn lookup(&self, selector: [u8; 4]) -> Result<Option<String>, LookupError> {
        Ok(self.entries.get(&selector).cloned())
    }
}
