//! chaindecode-codec: binary decoding for the EVM decode pipeline.
//!
//! Everything here is pure and synchronous:
//!
//! - [`transaction`]: RLP envelope → [`TxEnvelope`], content hash, sender recovery
//! - [`response`]: protobuf execution result → logs, gas used, VM error
//! - [`classify`]: logs → ERC-20 / ERC-721 / ERC-1155 transfers and token rows
//! - [`contract`]: CREATE address derivation and deployment records
//! - [`calldata`]: call-argument decoding against a function signature

pub mod calldata;
pub mod classify;
pub mod contract;
pub mod error;
pub mod keccak;
pub mod payload;
pub mod response;
pub mod transaction;

pub use classify::{classify, classify_logs, Classification, EventKind, TokenEvent};
pub use contract::{derive_contract_address, track_creation};
pub use error::CodecError;
pub use payload::decode_payload;
pub use response::{decode_execution_result, ExecutionResult, ETH_TX_RESPONSE_TYPE_URL};
pub use transaction::{decode_transaction, TxEnvelope, TxSignature, TxType};
