//! Error types for the chaindecode pipeline.

use thiserror::Error;

/// Errors surfaced by stores, schedulers and the priority path.
///
/// Per-transaction decode problems are not errors at this level: they are
/// folded into the decoded record (sentinel rows, default status). Anything
/// that reaches a `PipelineError` aborts the unit of work it occurred in.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl PipelineError {
    /// Returns `true` if retrying the same unit of work later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Timeout { .. })
    }
}
