//! Out-of-band decode of a single transaction.
//!
//! The priority path shares no lock with the batch scheduler. Both end in the
//! store's insert-if-absent commit, so when they race on a key the second
//! write is a no-op.

use std::sync::Arc;
use std::time::Duration;

use chaindecode_core::{CommitSummary, DecodeStore, PipelineError};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::decoder::TxDecoder;
use crate::stats::PipelineStats;

/// What a decode-one request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PriorityOutcome {
    /// This request wrote the row (possibly a sentinel).
    Decoded(CommitSummary),
    /// A row for the key already existed, or another writer won the race.
    AlreadyDecoded,
    /// The key is not in the ingestion table.
    NotPending,
}

pub struct PriorityDecoder {
    store: Arc<dyn DecodeStore>,
    decoder: Arc<TxDecoder>,
    request_timeout: Duration,
    stats: Arc<PipelineStats>,
}

impl PriorityDecoder {
    pub fn new(
        store: Arc<dyn DecodeStore>,
        decoder: Arc<TxDecoder>,
        request_timeout: Duration,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            store,
            decoder,
            request_timeout,
            stats,
        }
    }

    /// Decode and commit `tx_key` now, regardless of the scheduler's cadence.
    pub async fn decode_one(&self, tx_key: &str) -> Result<PriorityOutcome, PipelineError> {
        let Some(pending) = self.store.fetch_pending_one(tx_key).await? else {
            return if self.store.is_decoded(tx_key).await? {
                Ok(PriorityOutcome::AlreadyDecoded)
            } else {
                Ok(PriorityOutcome::NotPending)
            };
        };

        let bundle = self.decoder.decode(&pending).await;
        let summary = self.store.commit(std::slice::from_ref(&bundle)).await?;
        self.stats.record_commit(&summary);

        if summary.written == 0 {
            debug!(tx_key = %tx_key, "lost race to the batch scheduler");
            return Ok(PriorityOutcome::AlreadyDecoded);
        }
        Ok(PriorityOutcome::Decoded(summary))
    }

    /// [`decode_one`](Self::decode_one) under the request timeout.
    ///
    /// A timed-out request is dropped before or during its commit, which
    /// either applies whole or not at all.
    pub async fn decode_with_timeout(&self, tx_key: &str) -> Result<PriorityOutcome, PipelineError> {
        tokio::time::timeout(self.request_timeout, self.decode_one(tx_key))
            .await
            .map_err(|_| PipelineError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            })?
    }

    /// Serve keys from the trigger channel until it closes or `cancel` fires.
    ///
    /// Each request runs in its own task. In-flight requests are awaited
    /// before returning.
    pub async fn listen(self: Arc<Self>, mut rx: mpsc::Receiver<String>, cancel: CancellationToken) {
        info!("priority listener started");
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                msg = rx.recv() => match msg {
                    Some(key) => {
                        let this = Arc::clone(&self);
                        tasks.spawn(async move { this.handle(key).await });
                    }
                    None => break,
                },
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}
        info!("priority listener stopped");
    }

    async fn handle(&self, tx_key: String) {
        let key = tx_key.trim();
        if key.is_empty() {
            return;
        }
        self.stats.record_priority_request();

        match self.decode_with_timeout(key).await {
            Ok(outcome) => info!(tx_key = %key, outcome = ?outcome, "priority decode"),
            Err(PipelineError::Timeout { ms }) => {
                self.stats.record_priority_timeout();
                warn!(tx_key = %key, timeout_ms = ms, "priority decode timed out");
            }
            Err(e) => {
                self.stats.record_error();
                warn!(tx_key = %key, error = %e, "priority decode failed");
            }
        }
    }
}
