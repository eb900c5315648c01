//! Storage contract for the decode pipeline.
//!
//! The pending set is derived: a key is pending while it appears in the
//! ingestion table and has no decoded transaction row. Ingestion rows are
//! never deleted, so a commit alone moves a key out of the pending set.

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::types::{
    CommitSummary, Contract, DecodedBundle, DecodedTransaction, LogEntry, PendingTx, Token,
    TokenTransfer,
};

/// Trait for reading pending work and persisting decoded bundles.
///
/// Implementations include `MemoryDecodeStore`, `SqliteDecodeStore`,
/// and `PostgresDecodeStore`.
#[async_trait]
pub trait DecodeStore: Send + Sync {
    /// Up to `limit` pending transactions, ascending by height then key.
    async fn fetch_pending(&self, limit: usize) -> Result<Vec<PendingTx>, PipelineError>;

    /// The pending entry for `tx_key`, or `None` if it is unknown or already decoded.
    async fn fetch_pending_one(&self, tx_key: &str) -> Result<Option<PendingTx>, PipelineError>;

    /// Whether a transaction row (sentinel included) exists for `tx_key`.
    async fn is_decoded(&self, tx_key: &str) -> Result<bool, PipelineError>;

    /// Persist bundles atomically.
    ///
    /// Each transaction row is insert-if-absent. A bundle whose key is already
    /// decoded is skipped along with its children. A bundle whose hash collides
    /// with a different key is stored as a sentinel instead.
    async fn commit(&self, bundles: &[DecodedBundle]) -> Result<CommitSummary, PipelineError>;

    /// The decoded transaction row for `tx_key`.
    async fn transaction(&self, tx_key: &str)
        -> Result<Option<DecodedTransaction>, PipelineError>;

    /// Logs for `tx_key`, ordered by index.
    async fn logs(&self, tx_key: &str) -> Result<Vec<LogEntry>, PipelineError>;

    /// Token transfers for `tx_key`, ordered by log index.
    async fn transfers(&self, tx_key: &str) -> Result<Vec<TokenTransfer>, PipelineError>;

    /// Registry row for a token address.
    async fn token(&self, address: &str) -> Result<Option<Token>, PipelineError>;

    /// Deployment record for a contract address.
    async fn contract(&self, address: &str) -> Result<Option<Contract>, PipelineError>;

    /// Number of keys still pending.
    async fn pending_count(&self) -> Result<u64, PipelineError>;
}
