//! chaindecode-pipeline: turns pending raw EVM transactions into decoded rows.
//!
//! Two writers share one [`DecodeStore`](chaindecode_core::DecodeStore):
//!
//! - [`BatchScheduler`]: polls the pending set and commits whole batches
//! - [`PriorityDecoder`]: decodes a single key on demand from a trigger channel
//!
//! Neither takes a lock on the other. Both commit through the store's
//! insert-if-absent write, so a key decoded twice is stored once.
//!
//! # Quick Start
//! ```rust,ignore
//! let store = Arc::new(SqliteDecodeStore::open("./decode.db").await?);
//! let pipeline = Pipeline::from_config(PipelineConfig::default(), store)?;
//! let (triggers, rx) = pipeline.trigger_channel();
//! let cancel = CancellationToken::new();
//! pipeline.run(rx, cancel).await;
//! ```

pub mod config;
pub mod decoder;
pub mod pipeline;
pub mod priority;
pub mod scheduler;
pub mod stats;
pub mod telemetry;

pub use config::{PipelineConfig, PriorityConfig, SignatureConfig};
pub use decoder::TxDecoder;
pub use pipeline::Pipeline;
pub use priority::{PriorityDecoder, PriorityOutcome};
pub use scheduler::{BatchScheduler, CycleReport, SchedulerOptions, SchedulerState};
pub use stats::{PipelineStats, StatsSnapshot};
pub use telemetry::{init_tracing, LogConfig};
