//! chaindecode-storage: pluggable `DecodeStore` backends.
//!
//! Backends:
//! - [`memory`]: in-memory (dev/testing, no persistence)
//! - `sqlite`: SQLite via `sqlx` (embedded, single-file persistence)
//! - `postgres`: PostgreSQL via `sqlx`, plus `PgTriggerListener` for
//!   LISTEN/NOTIFY priority triggers
//!
//! Every backend gives the same guarantees: the transaction row is
//! insert-if-absent on its key, a bundle whose key is already decoded is a
//! no-op, and a content-hash collision turns the newcomer into a sentinel.

use chaindecode_core::DecodedTransaction;

pub mod memory;

#[cfg(any(feature = "sqlite", feature = "postgres"))]
mod rows;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "postgres")]
pub mod notify;

#[cfg(test)]
pub(crate) mod testing;

pub use memory::MemoryDecodeStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDecodeStore;

#[cfg(feature = "postgres")]
pub use postgres::{PostgresDecodeStore, PostgresOptions};

#[cfg(feature = "postgres")]
pub use notify::PgTriggerListener;

/// Sentinel stored for `tx` when its content hash is already owned by `owner`.
pub(crate) fn collision_sentinel(tx: &DecodedTransaction, owner: &str) -> DecodedTransaction {
    DecodedTransaction::sentinel(
        tx.tx_key.clone(),
        tx.height,
        format!(
            "content hash {} already recorded for {owner}",
            tx.hash.as_deref().unwrap_or_default()
        ),
    )
}
