//! Pipeline counters shared by the scheduler and the priority path.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use chaindecode_core::CommitSummary;

/// Live counters. Cheap to update from any task.
#[derive(Debug, Default)]
pub struct PipelineStats {
    cycles: AtomicU64,
    decoded: AtomicU64,
    sentinels: AtomicU64,
    skipped: AtomicU64,
    errors: AtomicU64,
    priority_requests: AtomicU64,
    priority_timeouts: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Completed scheduler cycles, empty ones included.
    pub cycles: u64,
    /// Transaction rows written (sentinels included).
    pub decoded: u64,
    pub sentinels: u64,
    /// Bundles dropped because the other path wrote the key first.
    pub skipped: u64,
    /// Failed cycles and failed priority requests.
    pub errors: u64,
    pub priority_requests: u64,
    pub priority_timeouts: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_commit(&self, summary: &CommitSummary) {
        self.decoded.fetch_add(summary.written as u64, Ordering::Relaxed);
        self.sentinels.fetch_add(summary.sentinels as u64, Ordering::Relaxed);
        self.skipped.fetch_add(summary.skipped as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_priority_request(&self) {
        self.priority_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_priority_timeout(&self) {
        self.priority_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            decoded: self.decoded.load(Ordering::Relaxed),
            sentinels: self.sentinels.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            priority_requests: self.priority_requests.load(Ordering::Relaxed),
            priority_timeouts: self.priority_timeouts.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_counts_accumulate() {
        let stats = PipelineStats::new();
        stats.record_commit(&CommitSummary { written: 9, skipped: 0, sentinels: 1 });
        stats.record_commit(&CommitSummary { written: 0, skipped: 2, sentinels: 0 });
        stats.record_cycle();

        let snap = stats.snapshot();
        assert_eq!(snap.decoded, 9);
        assert_eq!(snap.sentinels, 1);
        assert_eq!(snap.skipped, 2);
        assert_eq!(snap.cycles, 1);
        assert_eq!(snap.errors, 0);
    }
}
