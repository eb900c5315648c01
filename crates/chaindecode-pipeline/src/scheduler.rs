//! The batch scheduler: poll pending work, decode it, commit it as one unit.
//!
//! # Cycle
//! 1. Fetch up to `batch_size` pending transactions (height, then key).
//! 2. Decode each one. Envelope failures become sentinels inside the batch.
//! 3. Commit every bundle in a single atomic store call.
//!
//! A full batch starts the next cycle immediately; an empty or partial one
//! waits `poll_interval_ms`. A failed cycle commits nothing and waits
//! `error_backoff_ms`. Cancellation is checked between cycles only, so a
//! batch is never left half-committed.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chaindecode_core::{DecodeStore, DecodedBundle, PendingTx, PipelineError};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::PipelineConfig;
use crate::decoder::TxDecoder;
use crate::stats::PipelineStats;

/// Lifecycle state of the scheduler loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulerState {
    /// Waiting out the poll interval (or not started yet).
    Idle,
    /// Fetching, decoding or committing a batch.
    Processing,
    /// Waiting out the error backoff after a failed cycle.
    Backoff,
    /// The loop has exited.
    Stopped,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Processing => write!(f, "processing"),
            Self::Backoff => write!(f, "backoff"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Result of one scheduler cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleReport {
    pub fetched: usize,
    pub written: usize,
    pub skipped: usize,
    pub sentinels: usize,
}

/// Scheduler tunables, taken from [`PipelineConfig`].
#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub decode_concurrency: usize,
}

impl From<&PipelineConfig> for SchedulerOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            poll_interval: config.poll_interval(),
            error_backoff: config.error_backoff(),
            decode_concurrency: config.decode_concurrency,
        }
    }
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

pub struct BatchScheduler {
    store: Arc<dyn DecodeStore>,
    decoder: Arc<TxDecoder>,
    options: SchedulerOptions,
    state: Mutex<SchedulerState>,
    stats: Arc<PipelineStats>,
}

impl BatchScheduler {
    pub fn new(
        store: Arc<dyn DecodeStore>,
        decoder: Arc<TxDecoder>,
        options: SchedulerOptions,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            store,
            decoder,
            options,
            state: Mutex::new(SchedulerState::Idle),
            stats,
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: SchedulerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        &self.stats
    }

    /// Run cycles until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            batch_size = self.options.batch_size,
            poll_interval_ms = self.options.poll_interval.as_millis() as u64,
            decode_concurrency = self.options.decode_concurrency,
            "batch scheduler started"
        );

        while !cancel.is_cancelled() {
            self.set_state(SchedulerState::Processing);

            let wait = match self.run_cycle().await {
                Ok(report) if report.fetched >= self.options.batch_size => {
                    debug!(fetched = report.fetched, "full batch, draining backlog");
                    continue;
                }
                Ok(_) => {
                    self.set_state(SchedulerState::Idle);
                    self.options.poll_interval
                }
                Err(e) => {
                    self.stats.record_error();
                    error!(
                        error = %e,
                        backoff_ms = self.options.error_backoff.as_millis() as u64,
                        "batch failed, nothing committed"
                    );
                    self.set_state(SchedulerState::Backoff);
                    self.options.error_backoff
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        self.set_state(SchedulerState::Stopped);
        info!("batch scheduler stopped");
    }

    /// One fetch → decode → commit pass.
    ///
    /// On error nothing from this batch is visible and every fetched
    /// transaction is still pending.
    pub async fn run_cycle(&self) -> Result<CycleReport, PipelineError> {
        let pending = self.store.fetch_pending(self.options.batch_size).await?;
        if pending.is_empty() {
            self.stats.record_cycle();
            return Ok(CycleReport::default());
        }

        let bundles = self.decode_batch(&pending).await;
        let summary = self.store.commit(&bundles).await?;
        self.stats.record_commit(&summary);
        self.stats.record_cycle();

        let report = CycleReport {
            fetched: pending.len(),
            written: summary.written,
            skipped: summary.skipped,
            sentinels: summary.sentinels,
        };
        info!(
            fetched = report.fetched,
            written = report.written,
            skipped = report.skipped,
            sentinels = report.sentinels,
            "batch committed"
        );
        Ok(report)
    }

    /// Decode in input order. Parallel decode still yields bundles in order.
    async fn decode_batch(&self, pending: &[PendingTx]) -> Vec<DecodedBundle> {
        if self.options.decode_concurrency <= 1 {
            let mut bundles = Vec::with_capacity(pending.len());
            for p in pending {
                bundles.push(self.decoder.decode(p).await);
            }
            return bundles;
        }

        let futures: Vec<_> = pending.iter().map(|p| self.decoder.decode(p)).collect();
        stream::iter(futures)
            .buffered(self.options.decode_concurrency)
            .collect()
            .await
    }
}
