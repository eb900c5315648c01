//! Pipeline configuration.

use chaindecode_codec::ETH_TX_RESPONSE_TYPE_URL;
use chaindecode_core::PipelineError;
use chaindecode_signatures::DEFAULT_LOOKUP_URL;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::telemetry::LogConfig;

/// Selector lookup settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureConfig {
    /// Base URL of a 4byte.directory-compatible service
    #[serde(default = "default_lookup_url")]
    pub lookup_url: String,
    /// Per-request timeout in milliseconds
    #[serde(default = "default_lookup_timeout_ms")]
    pub timeout_ms: u64,
    /// Cache entry lifetime; `None` keeps entries for the whole process
    #[serde(default)]
    pub cache_ttl_secs: Option<u64>,
}

fn default_lookup_url() -> String { DEFAULT_LOOKUP_URL.to_string() }
fn default_lookup_timeout_ms() -> u64 { 5_000 }

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            lookup_url: default_lookup_url(),
            timeout_ms: default_lookup_timeout_ms(),
            cache_ttl_secs: None,
        }
    }
}

/// Priority path settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityConfig {
    /// Deadline for a single decode-one request
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Capacity of the trigger channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Postgres NOTIFY channel carrying tx keys (Postgres backend only)
    #[serde(default = "default_notify_channel")]
    pub notify_channel: String,
}

fn default_request_timeout_ms() -> u64 { 15_000 }
fn default_channel_capacity() -> usize { 256 }
fn default_notify_channel() -> String { "chaindecode_priority".to_string() }

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            channel_capacity: default_channel_capacity(),
            notify_channel: default_notify_channel(),
        }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Idle wait between polls when the last batch was not full
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum pending transactions per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Wait after a failed batch; longer than the poll interval
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,
    /// Transactions decoded in parallel within a batch (1 = sequential)
    #[serde(default = "default_decode_concurrency")]
    pub decode_concurrency: usize,
    /// `type_url` of the EVM response inside `TxMsgData`
    #[serde(default = "default_response_type_url")]
    pub response_type_url: String,
    #[serde(default)]
    pub signatures: SignatureConfig,
    #[serde(default)]
    pub priority: PriorityConfig,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_poll_interval_ms() -> u64 { 2_000 }
fn default_batch_size() -> usize { 100 }
fn default_error_backoff_ms() -> u64 { 10_000 }
fn default_decode_concurrency() -> usize { 1 }
fn default_response_type_url() -> String { ETH_TX_RESPONSE_TYPE_URL.to_string() }

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            batch_size: default_batch_size(),
            error_backoff_ms: default_error_backoff_ms(),
            decode_concurrency: default_decode_concurrency(),
            response_type_url: default_response_type_url(),
            signatures: SignatureConfig::default(),
            priority: PriorityConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, PipelineError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let fail = |msg: &str| Err(PipelineError::Config(msg.to_string()));

        if self.batch_size == 0 {
            return fail("batch_size must be at least 1");
        }
        if self.poll_interval_ms == 0 {
            return fail("poll_interval_ms must be positive");
        }
        if self.error_backoff_ms <= self.poll_interval_ms {
            return fail("error_backoff_ms must exceed poll_interval_ms");
        }
        if self.decode_concurrency == 0 {
            return fail("decode_concurrency must be at least 1");
        }
        if self.response_type_url.is_empty() {
            return fail("response_type_url must not be empty");
        }
        if self.signatures.timeout_ms == 0 {
            return fail("signatures.timeout_ms must be positive");
        }
        if self.priority.request_timeout_ms == 0 {
            return fail("priority.request_timeout_ms must be positive");
        }
        if self.priority.channel_capacity == 0 {
            return fail("priority.channel_capacity must be at least 1");
        }
        if self.priority.notify_channel.trim().is_empty() {
            return fail("priority.notify_channel must not be empty");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.priority.request_timeout_ms)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.signatures.timeout_ms)
    }
}
