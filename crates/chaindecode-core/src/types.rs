//! Decoded-record types shared by every stage of the pipeline.
//!
//! Large integers (`value`, gas prices, gas limit) are carried as `U256` and
//! only turned into decimal strings at the storage boundary.

use alloy_primitives::{Bytes, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

// ─── PendingTx ────────────────────────────────────────────────────────────────

/// One entry of the "pending decode" set written by the ingestion engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTx {
    /// Source (host-chain) transaction key.
    pub tx_key: String,
    /// Host-chain block height.
    pub height: u64,
    /// Encoded transaction envelope (hex or base64).
    pub raw_tx: String,
    /// Encoded execution response (hex or base64), when the ingestion engine has it.
    pub raw_response: Option<String>,
    /// Gas used, if already known from another source.
    pub gas_used: Option<u64>,
}

impl PendingTx {
    pub fn new(tx_key: impl Into<String>, height: u64, raw_tx: impl Into<String>) -> Self {
        Self {
            tx_key: tx_key.into(),
            height,
            raw_tx: raw_tx.into(),
            raw_response: None,
            gas_used: None,
        }
    }

    /// Attach an encoded execution response.
    pub fn with_response(mut self, raw_response: impl Into<String>) -> Self {
        self.raw_response = Some(raw_response.into());
        self
    }
}

// ─── ExecStatus ───────────────────────────────────────────────────────────────

/// Terminal status of a decoded transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecStatus {
    /// Executed without a VM error (also the default when no response is available).
    Success,
    /// The execution response carried a VM error.
    Failed,
    /// The envelope could not be decoded; the row is a sentinel.
    DecodeFailed,
}

impl ExecStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::DecodeFailed => "decode_failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "decode_failed" => Some(Self::DecodeFailed),
            _ => None,
        }
    }
}

impl fmt::Display for ExecStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── DecodedTransaction ───────────────────────────────────────────────────────

/// One decoded EVM transaction, keyed by its host-chain transaction key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedTransaction {
    pub tx_key: String,
    pub height: u64,
    /// keccak256 of the canonical envelope (`0x…`); `None` on sentinel rows.
    pub hash: Option<String>,
    /// Recovered sender (lowercase `0x…`); `None` when recovery failed.
    pub from: Option<String>,
    /// Recipient; `None` for contract creation.
    pub to: Option<String>,
    pub nonce: u64,
    pub gas_limit: U256,
    pub gas_price: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub max_priority_fee_per_gas: Option<U256>,
    pub value: U256,
    pub input: Bytes,
    /// EIP-2718 type (0 = legacy).
    pub tx_type: u8,
    pub chain_id: Option<u64>,
    pub gas_used: Option<u64>,
    pub status: ExecStatus,
    /// VM error string from the execution response.
    pub vm_error: Option<String>,
    pub function_name: Option<String>,
    pub function_signature: Option<String>,
    pub decoded_args: Option<serde_json::Value>,
    pub contract_address: Option<String>,
    /// Decode failure reason, set on sentinel rows only.
    pub error: Option<String>,
}

impl DecodedTransaction {
    /// Build the marker row for a transaction whose envelope cannot be decoded.
    pub fn sentinel(tx_key: impl Into<String>, height: u64, reason: impl Into<String>) -> Self {
        Self {
            tx_key: tx_key.into(),
            height,
            hash: None,
            from: None,
            to: None,
            nonce: 0,
            gas_limit: U256::ZERO,
            gas_price: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            value: U256::ZERO,
            input: Bytes::new(),
            tx_type: 0,
            chain_id: None,
            gas_used: None,
            status: ExecStatus::DecodeFailed,
            vm_error: None,
            function_name: None,
            function_signature: None,
            decoded_args: None,
            contract_address: None,
            error: Some(reason.into()),
        }
    }

    /// Returns `true` for "permanently undecodable" marker rows.
    pub fn is_sentinel(&self) -> bool {
        self.status == ExecStatus::DecodeFailed
    }

    /// Returns `true` if this is a contract-creation transaction.
    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none() && !self.is_sentinel()
    }

    /// Leading 4-byte function selector, if the call data has one.
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.input.get(..4).and_then(|s| s.try_into().ok())
    }
}

// ─── LogEntry ─────────────────────────────────────────────────────────────────

/// One event emitted during execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub tx_key: String,
    /// Index within the transaction (ordering key).
    pub index: u32,
    /// Emitting contract (lowercase `0x…`).
    pub address: String,
    /// 0–4 topic hashes (`0x` + 64 hex).
    pub topics: Vec<String>,
    pub data: Bytes,
}

impl LogEntry {
    /// topics[0], conventionally the event signature hash.
    pub fn topic0(&self) -> Option<&str> {
        self.topics.first().map(String::as_str)
    }
}

// ─── Tokens ───────────────────────────────────────────────────────────────────

/// Token standard inferred from event shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenStandard {
    #[serde(rename = "ERC-20")]
    Erc20,
    #[serde(rename = "ERC-721")]
    Erc721,
    #[serde(rename = "ERC-1155")]
    Erc1155,
}

impl TokenStandard {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Erc20 => "ERC-20",
            Self::Erc721 => "ERC-721",
            Self::Erc1155 => "ERC-1155",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ERC-20" => Some(Self::Erc20),
            "ERC-721" => Some(Self::Erc721),
            "ERC-1155" => Some(Self::Erc1155),
            _ => None,
        }
    }

    /// Strength of the inference; registry rows only move to a higher rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Erc20 => 0,
            Self::Erc721 => 1,
            Self::Erc1155 => 2,
        }
    }
}

impl fmt::Display for TokenStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified transfer event.
///
/// `value` is a decimal string: the amount for ERC-20, the token id for
/// ERC-721, and `"{id}:{amount}"` for ERC-1155.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransfer {
    pub tx_key: String,
    pub log_index: u32,
    pub token: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub standard: TokenStandard,
}

/// Registry row for a contract observed behaving as a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub address: String,
    pub standard: TokenStandard,
    pub verified: bool,
}

impl Token {
    /// An unverified registry entry inferred from an event.
    pub fn inferred(address: impl Into<String>, standard: TokenStandard) -> Self {
        Self {
            address: address.into(),
            standard,
            verified: false,
        }
    }
}

// ─── Contract ─────────────────────────────────────────────────────────────────

/// Contract-creation provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
    pub address: String,
    pub creator: String,
    /// Key of the creating transaction.
    pub creation_tx: String,
    pub creation_height: u64,
    pub bytecode_hash: Option<String>,
}

// ─── DecodedBundle ────────────────────────────────────────────────────────────

/// Everything produced for one pending transaction, persisted as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedBundle {
    pub transaction: DecodedTransaction,
    pub logs: Vec<LogEntry>,
    pub transfers: Vec<TokenTransfer>,
    pub tokens: Vec<Token>,
    pub contract: Option<Contract>,
}

impl DecodedBundle {
    pub fn new(transaction: DecodedTransaction) -> Self {
        Self {
            transaction,
            logs: vec![],
            transfers: vec![],
            tokens: vec![],
            contract: None,
        }
    }

    /// A bundle holding only the sentinel row for `pending`.
    pub fn sentinel(pending: &PendingTx, reason: impl Into<String>) -> Self {
        Self::new(DecodedTransaction::sentinel(
            pending.tx_key.clone(),
            pending.height,
            reason,
        ))
    }

    pub fn tx_key(&self) -> &str {
        &self.transaction.tx_key
    }

    pub fn is_sentinel(&self) -> bool {
        self.transaction.is_sentinel()
    }
}

/// Outcome of one `DecodeStore::commit` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    /// Bundles whose transaction row was newly written (sentinels included).
    pub written: usize,
    /// Bundles skipped because the key was already decoded.
    pub skipped: usize,
    /// Decode-failed rows written (envelope failures and hash collisions).
    pub sentinels: usize,
}

impl CommitSummary {
    pub fn merge(&mut self, other: CommitSummary) {
        self.written += other.written;
        self.skipped += other.skipped;
        self.sentinels += other.sentinels;
    }
}

/// Lowercase an address and make sure it carries a `0x` prefix.
pub fn normalize_address(addr: &str) -> String {
    let trimmed = addr.trim();
    let bare = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    format!("0x{}", bare.to_ascii_lowercase())
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_distinguishable() {
        let tx = DecodedTransaction::sentinel("key-1", 10, "bad rlp");
        assert!(tx.is_sentinel());
        assert!(!tx.is_contract_creation());
        assert_eq!(tx.status, ExecStatus::DecodeFailed);
        assert_eq!(tx.error.as_deref(), Some("bad rlp"));
        assert!(tx.hash.is_none());
    }

    #[test]
    fn selector_needs_four_bytes() {
        let mut tx = DecodedTransaction::sentinel("k", 1, "x");
        tx.input = Bytes::from(vec![0xa9, 0x05, 0x9c]);
        assert!(tx.selector().is_none());
        tx.input = Bytes::from(vec![0xa9, 0x05, 0x9c, 0xbb, 0x00]);
        assert_eq!(tx.selector(), Some([0xa9, 0x05, 0x9c, 0xbb]));
    }

    #[test]
    fn token_rank_orders_inference_strength() {
        assert!(TokenStandard::Erc721.rank() > TokenStandard::Erc20.rank());
        assert!(TokenStandard::Erc1155.rank() > TokenStandard::Erc721.rank());
        for s in [TokenStandard::Erc20, TokenStandard::Erc721, TokenStandard::Erc1155] {
            assert_eq!(TokenStandard::parse(s.as_str()), Some(s));
        }
    }

    #[test]
    fn status_string_roundtrip() {
        for s in [ExecStatus::Success, ExecStatus::Failed, ExecStatus::DecodeFailed] {
            assert_eq!(ExecStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(ExecStatus::parse("pending"), None);
    }

    #[test]
    fn normalize_address_lowercases() {
        assert_eq!(
            normalize_address("0xAbCdEF0000000000000000000000000000000001"),
            "0xabcdef0000000000000000000000000000000001"
        );
        assert_eq!(normalize_address("ABCD"), "0xabcd");
    }

    #[test]
    fn commit_summary_merge() {
        let mut a = CommitSummary { written: 2, skipped: 1, sentinels: 0 };
        a.merge(CommitSummary { written: 1, skipped: 0, sentinels: 1 });
        assert_eq!(a, CommitSummary { written: 3, skipped: 1, sentinels: 1 });
    }
}
