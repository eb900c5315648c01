//! PostgreSQL LISTEN/NOTIFY feed for the priority path.
//!
//! The ingestion side publishes a transaction key with
//! `SELECT pg_notify('<channel>', '<tx_key>')` (see
//! [`PostgresDecodeStore::notify`](crate::postgres::PostgresDecodeStore::notify)).
//! [`PgTriggerListener`] forwards each payload into the trigger channel the
//! priority decoder consumes.
//!
//! Notifications published while the listener is disconnected are lost.
//! The batch scheduler still picks those keys up on a later cycle.

use std::time::Duration;

use sqlx::postgres::PgListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chaindecode_core::PipelineError;

/// Wait after a failed receive before the listener reconnects.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// A dedicated connection LISTENing on one channel.
pub struct PgTriggerListener {
    listener: PgListener,
    channel: String,
}

impl PgTriggerListener {
    /// Open a listener connection and subscribe to `channel`.
    pub async fn connect(database_url: &str, channel: &str) -> Result<Self, PipelineError> {
        let mut listener = PgListener::connect(database_url)
            .await
            .map_err(|e| PipelineError::Storage(format!("postgres listen connect: {e}")))?;
        listener
            .listen(channel)
            .await
            .map_err(|e| PipelineError::Storage(format!("LISTEN {channel}: {e}")))?;

        info!(channel = %channel, "listening for priority triggers");
        Ok(Self {
            listener,
            channel: channel.to_string(),
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Forward notification payloads into `triggers` until `cancel` fires or
    /// the receiving side is dropped. Returns the number of keys forwarded.
    ///
    /// Blank payloads are ignored. A broken connection is re-established by
    /// the next receive.
    pub async fn forward(mut self, triggers: mpsc::Sender<String>, cancel: CancellationToken) -> u64 {
        let mut forwarded = 0u64;

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                n = self.listener.recv() => n,
            };

            let key = match received {
                Ok(notification) => notification.payload().trim().to_string(),
                Err(e) => {
                    warn!(channel = %self.channel, error = %e, "notification stream interrupted");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => continue,
                    }
                }
            };
            if key.is_empty() {
                debug!(channel = %self.channel, "ignoring blank trigger");
                continue;
            }

            let sent = tokio::select! {
                _ = cancel.cancelled() => break,
                r = triggers.send(key) => r,
            };
            if sent.is_err() {
                debug!(channel = %self.channel, "trigger channel closed");
                break;
            }
            forwarded += 1;
        }

        info!(channel = %self.channel, forwarded, "priority trigger listener stopped");
        forwarded
    }
}
