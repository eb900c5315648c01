//! Token-standard log classifier.
//!
//! ERC-20 and ERC-721 share the `Transfer` and `Approval` signatures; they
//! differ only in how many fields are indexed. The shape of the topic list is
//! therefore the only evidence available without calling the contract:
//!
//! ```text
//! Transfer(address indexed, address indexed, uint256)          → 3 topics → ERC-20
//! Transfer(address indexed, address indexed, uint256 indexed)  → 4 topics → ERC-721
//! TransferSingle / TransferBatch                               → ERC-1155
//! ```

use alloy_primitives::U256;
use chaindecode_core::{LogEntry, Token, TokenStandard, TokenTransfer};
use std::collections::HashMap;
use tracing::debug;

use crate::error::CodecError;

/// `Transfer(address,address,uint256)`
pub const TRANSFER_TOPIC: &str =
    "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
/// `Approval(address,address,uint256)`
pub const APPROVAL_TOPIC: &str =
    "0x8c5be1e5ebec7d5bd14f71427d1e84f3dd0314c0f7b2291e5b200ac8c7c3b925";
/// `ApprovalForAll(address,address,bool)`
pub const APPROVAL_FOR_ALL_TOPIC: &str =
    "0x17307eab39ab6107e8899845ad3d59bd9653f200f220920489ca2b5937696c31";
/// `TransferSingle(address,address,address,uint256,uint256)`
pub const TRANSFER_SINGLE_TOPIC: &str =
    "0xc3d58168c5ae7397731d063d5bbf3d657854427343f4c083240f7aacaa2d0f62";
/// `TransferBatch(address,address,address,uint256[],uint256[])`
pub const TRANSFER_BATCH_TOPIC: &str =
    "0x4a39dc06d4c0dbc64b70af90fd698a233a518aa5d07e595d983b8c0526c8f7fb";

/// Known token event signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Transfer,
    Approval,
    ApprovalForAll,
    TransferSingle,
    TransferBatch,
}

impl EventKind {
    fn from_topic0(topic0: &str) -> Option<Self> {
        const TABLE: [(&str, EventKind); 5] = [
            (TRANSFER_TOPIC, EventKind::Transfer),
            (APPROVAL_TOPIC, EventKind::Approval),
            (APPROVAL_FOR_ALL_TOPIC, EventKind::ApprovalForAll),
            (TRANSFER_SINGLE_TOPIC, EventKind::TransferSingle),
            (TRANSFER_BATCH_TOPIC, EventKind::TransferBatch),
        ];
        TABLE
            .iter()
            .find(|(topic, _)| topic.eq_ignore_ascii_case(topic0))
            .map(|(_, kind)| *kind)
    }

    /// Whether this event moves tokens (as opposed to only proving the contract is a token).
    pub fn is_transfer(&self) -> bool {
        matches!(
            self,
            Self::Transfer | Self::TransferSingle | Self::TransferBatch
        )
    }
}

/// Result of classifying one log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenEvent {
    pub kind: EventKind,
    pub standard: TokenStandard,
}

/// Classify a log by `(topic0, topic_count)`. Pure; no payload inspection.
pub fn classify(topic0: &str, topic_count: usize) -> Option<TokenEvent> {
    let kind = EventKind::from_topic0(topic0)?;
    let standard = match (kind, topic_count) {
        (EventKind::Transfer | EventKind::Approval, 3) => TokenStandard::Erc20,
        (EventKind::Transfer | EventKind::Approval, 4) => TokenStandard::Erc721,
        (EventKind::Transfer | EventKind::Approval, _) => return None,
        (EventKind::ApprovalForAll, _) => TokenStandard::Erc721,
        (EventKind::TransferSingle | EventKind::TransferBatch, _) => TokenStandard::Erc1155,
    };
    Some(TokenEvent { kind, standard })
}

// ─── Extraction ───────────────────────────────────────────────────────────────

/// Transfers and token registry rows derived from one transaction's logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub transfers: Vec<TokenTransfer>,
    /// One row per address, holding the strongest standard seen.
    pub tokens: Vec<Token>,
}

/// Classify every log. A malformed log is skipped; the others are unaffected.
pub fn classify_logs(logs: &[LogEntry]) -> Classification {
    let mut transfers = Vec::new();
    let mut strongest: HashMap<String, TokenStandard> = HashMap::new();

    for log in logs {
        let Some(event) = log.topic0().and_then(|t0| classify(t0, log.topics.len())) else {
            continue;
        };

        match extract_transfer(log, event) {
            Ok(transfer) => {
                if let Some(t) = transfer {
                    transfers.push(t);
                }
                strongest
                    .entry(log.address.clone())
                    .and_modify(|s| {
                        if event.standard.rank() > s.rank() {
                            *s = event.standard;
                        }
                    })
                    .or_insert(event.standard);
            }
            Err(e) => {
                debug!(
                    tx_key = %log.tx_key,
                    log_index = log.index,
                    error = %e,
                    "skipping malformed token log"
                );
            }
        }
    }

    let mut tokens: Vec<Token> = strongest
        .into_iter()
        .map(|(address, standard)| Token::inferred(address, standard))
        .collect();
    tokens.sort_by(|a, b| a.address.cmp(&b.address));

    Classification { transfers, tokens }
}

/// Extract the transfer carried by a classified log.
///
/// Approvals and `TransferBatch` yield `Ok(None)`: they register the token
/// without producing a transfer row.
pub fn extract_transfer(
    log: &LogEntry,
    event: TokenEvent,
) -> Result<Option<TokenTransfer>, CodecError> {
    let (from, to, value) = match (event.kind, event.standard) {
        (EventKind::Transfer, TokenStandard::Erc20) => (
            topic_address(log, 1)?,
            topic_address(log, 2)?,
            data_word(log, 0)?.to_string(),
        ),
        (EventKind::Transfer, _) => (
            topic_address(log, 1)?,
            topic_address(log, 2)?,
            topic_word(log, 3)?.to_string(),
        ),
        (EventKind::TransferSingle, _) => (
            topic_address(log, 2)?,
            topic_address(log, 3)?,
            format!("{}:{}", data_word(log, 0)?, data_word(log, 1)?),
        ),
        (EventKind::TransferBatch, _) => {
            // operator, from, to
            for i in 1..=3 {
                topic_address(log, i)?;
            }
            return Ok(None);
        }
        _ => {
            // Approvals still need a well-formed indexed owner to count as evidence.
            topic_address(log, 1)?;
            return Ok(None);
        }
    };

    Ok(Some(TokenTransfer {
        tx_key: log.tx_key.clone(),
        log_index: log.index,
        token: log.address.clone(),
        from,
        to,
        value,
        standard: event.standard,
    }))
}

fn topic_bytes(log: &LogEntry, i: usize) -> Result<[u8; 32], CodecError> {
    let malformed = |reason: String| CodecError::MalformedLog {
        index: log.index,
        reason,
    };
    let topic = log
        .topics
        .get(i)
        .ok_or_else(|| malformed(format!("missing topic {i}")))?;
    let hex_str = topic.strip_prefix("0x").unwrap_or(topic);
    let mut out = [0u8; 32];
    hex::decode_to_slice(hex_str, &mut out)
        .map_err(|e| malformed(format!("topic {i}: {e}")))?;
    Ok(out)
}

fn topic_address(log: &LogEntry, i: usize) -> Result<String, CodecError> {
    let word = topic_bytes(log, i)?;
    Ok(format!("0x{}", hex::encode(&word[12..])))
}

fn topic_word(log: &LogEntry, i: usize) -> Result<U256, CodecError> {
    Ok(U256::from_be_bytes(topic_bytes(log, i)?))
}

/// The `i`-th 32-byte word of the data payload as an unsigned integer.
fn data_word(log: &LogEntry, i: usize) -> Result<U256, CodecError> {
    let start = i * 32;
    log.data
        .get(start..start + 32)
        .map(U256::from_be_slice)
        .ok_or_else(|| CodecError::MalformedLog {
            index: log.index,
            reason: format!("data too short for word {i}: {} bytes", log.data.len()),
        })
}

// ─── Tests ────────────────────────────────────────────────────────────────────
