//! chaindecode-core: shared record types and the storage contract for the
//! EVM transaction decode pipeline.
//!
//! # Architecture
//!
//! ```text
//! PendingTx (raw bytes from ingestion)
//!     │
//!     ├── chaindecode-codec       (envelope, execution result, logs, contracts)
//!     ├── chaindecode-signatures  (selector → function signature)
//!     │
//!     ▼
//! DecodedBundle ──► DecodeStore::commit  (memory / SQLite / Postgres)
//!     ▲
//!     └── chaindecode-pipeline    (BatchScheduler, PriorityDecoder)
//! ```

pub mod error;
pub mod store;
pub mod types;

pub use error::PipelineError;
pub use store::DecodeStore;
pub use types::{
    normalize_address, CommitSummary, Contract, DecodedBundle, DecodedTransaction, ExecStatus,
    LogEntry, PendingTx, Token, TokenStandard, TokenTransfer,
};
