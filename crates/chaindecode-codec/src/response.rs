//! Execution-result codec.
//!
//! The host chain returns a protobuf `TxMsgData` per transaction. It wraps one
//! or more message responses; the EVM one is `MsgEthereumTxResponse`, which
//! carries the emitted logs, gas used and the VM error string.
//!
//! Newer nodes fill `msg_responses` (`Any` with a type URL); older nodes fill
//! the deprecated `data` list (`MsgData` keyed by the request type URL). Both
//! are searched.

use alloy_primitives::Bytes;
use chaindecode_core::{normalize_address, LogEntry};
use prost::Message;

use crate::error::CodecError;
use crate::payload::decode_payload;

/// Default type URL of the EVM execution response.
pub const ETH_TX_RESPONSE_TYPE_URL: &str = "/ethermint.evm.v1.MsgEthereumTxResponse";

// ─── Wire messages ────────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Message)]
pub struct TxMsgData {
    #[prost(message, repeated, tag = "1")]
    pub data: Vec<MsgData>,
    #[prost(message, repeated, tag = "2")]
    pub msg_responses: Vec<Any>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MsgData {
    #[prost(string, tag = "1")]
    pub msg_type: String,
    #[prost(bytes = "vec", tag = "2")]
    pub data: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Any {
    #[prost(string, tag = "1")]
    pub type_url: String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MsgEthereumTxResponse {
    #[prost(string, tag = "1")]
    pub hash: String,
    #[prost(message, repeated, tag = "2")]
    pub logs: Vec<Log>,
    #[prost(bytes = "vec", tag = "3")]
    pub ret: Vec<u8>,
    #[prost(string, tag = "4")]
    pub vm_error: String,
    #[prost(uint64, tag = "5")]
    pub gas_used: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct Log {
    #[prost(string, tag = "1")]
    pub address: String,
    #[prost(string, repeated, tag = "2")]
    pub topics: Vec<String>,
    #[prost(bytes = "vec", tag = "3")]
    pub data: Vec<u8>,
    #[prost(uint64, tag = "4")]
    pub block_number: u64,
    #[prost(string, tag = "5")]
    pub tx_hash: String,
    #[prost(uint64, tag = "6")]
    pub tx_index: u64,
    #[prost(string, tag = "7")]
    pub block_hash: String,
    #[prost(uint64, tag = "8")]
    pub index: u64,
    #[prost(bool, tag = "9")]
    pub removed: bool,
}

// ─── ExecutionResult ──────────────────────────────────────────────────────────

/// What the pipeline keeps from an execution response.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub logs: Vec<LogEntry>,
    pub gas_used: u64,
    /// `None` when the VM error field is empty.
    pub vm_error: Option<String>,
    /// Return data of the call.
    pub ret: Bytes,
}

impl ExecutionResult {
    /// Derived from "is the VM error non-empty".
    pub fn failed(&self) -> bool {
        self.vm_error.is_some()
    }
}

/// Decode a text-encoded `TxMsgData` and extract the EVM response.
///
/// `type_url` selects the response message; see [`ETH_TX_RESPONSE_TYPE_URL`].
pub fn decode_execution_result(
    tx_key: &str,
    payload: &str,
    type_url: &str,
) -> Result<ExecutionResult, CodecError> {
    let bytes = decode_payload(payload)?;
    let msg_data = TxMsgData::decode(bytes.as_slice())?;
    let inner = find_response(&msg_data, type_url)?;
    let response = MsgEthereumTxResponse::decode(inner)?;
    Ok(to_result(tx_key, response))
}

/// First `msg_responses` entry with `type_url`, else the first legacy
/// `data` entry keyed by the request type (`type_url` minus `Response`).
fn find_response<'a>(msg_data: &'a TxMsgData, type_url: &str) -> Result<&'a [u8], CodecError> {
    if let Some(any) = msg_data.msg_responses.iter().find(|a| a.type_url == type_url) {
        return Ok(&any.value);
    }

    let request_type = type_url.strip_suffix("Response").unwrap_or(type_url);
    msg_data
        .data
        .iter()
        .find(|d| d.msg_type == request_type || d.msg_type == type_url)
        .map(|d| d.data.as_slice())
        .ok_or_else(|| CodecError::ResponseNotFound {
            type_url: type_url.to_string(),
        })
}

fn to_result(tx_key: &str, response: MsgEthereumTxResponse) -> ExecutionResult {
    let explicit = explicit_indices_usable(&response.logs);

    let logs = response
        .logs
        .into_iter()
        .enumerate()
        .map(|(pos, log)| LogEntry {
            tx_key: tx_key.to_string(),
            index: if explicit { log.index as u32 } else { pos as u32 },
            address: normalize_address(&log.address),
            topics: log.topics.iter().map(|t| t.to_ascii_lowercase()).collect(),
            data: Bytes::from(log.data),
        })
        .collect();

    let vm_error = Some(response.vm_error).filter(|e| !e.is_empty());

    ExecutionResult {
        logs,
        gas_used: response.gas_used,
        vm_error,
        ret: Bytes::from(response.ret),
    }
}

/// Explicit indices are used only when they are pairwise distinct and fit
/// `u32`. proto3 drops zero-valued fields, so a response that omits indices
/// decodes with every index equal to 0.
fn explicit_indices_usable(logs: &[Log]) -> bool {
    let mut seen = std::collections::HashSet::with_capacity(logs.len());
    logs.iter()
        .all(|l| l.index <= u32::MAX as u64 && seen.insert(l.index))
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn log(index: u64, topics: &[&str]) -> Log {
        Log {
            address: "0xAbCdEf0000000000000000000000000000000001".into(),
            topics: topics.iter().map(|t| t.to_string()).collect(),
            data: vec![0u8; 32],
            index,
            ..Default::default()
        }
    }

    fn encode(response: &MsgEthereumTxResponse, wrap_as_any: bool) -> String {
        let value = response.encode_to_vec();
        let msg = if wrap_as_any {
            TxMsgData {
                data: vec![],
                msg_responses: vec![
                    Any {
                        type_url: "/cosmos.bank.v1beta1.MsgSendResponse".into(),
                        value: vec![],
                    },
                    Any {
                        type_url: ETH_TX_RESPONSE_TYPE_URL.into(),
                        value,
                    },
                ],
            }
        } else {
            TxMsgData {
                data: vec![MsgData {
                    msg_type: "/ethermint.evm.v1.MsgEthereumTx".into(),
                    data: value,
                }],
                msg_responses: vec![],
            }
        };
        format!("0x{}", hex::encode(msg.encode_to_vec()))
    }

    #[test]
    fn decodes_logs_gas_and_success() {
        let response = MsgEthereumTxResponse {
            hash: "0xabc".into(),
            logs: vec![log(4, &["0xAA"]), log(5, &["0xBB", "0xCC"])],
            gas_used: 51_234,
            ..Default::default()
        };
        let result =
            decode_execution_result("k1", &encode(&response, true), ETH_TX_RESPONSE_TYPE_URL)
                .unwrap();

        assert_eq!(result.gas_used, 51_234);
        assert!(!result.failed());
        assert_eq!(result.logs.len(), 2);
        assert_eq!(result.logs[0].index, 4);
        assert_eq!(result.logs[1].index, 5);
        assert_eq!(result.logs[1].topics, vec!["0xbb", "0xcc"]);
        assert_eq!(
            result.logs[0].address,
            "0xabcdef0000000000000000000000000000000001"
        );
        assert_eq!(result.logs[0].tx_key, "k1");
    }

    #[test]
    fn vm_error_marks_failure() {
        let response = MsgEthereumTxResponse {
            vm_error: "execution reverted".into(),
            gas_used: 21_000,
            ..Default::default()
        };
        let result =
            decode_execution_result("k", &encode(&response, true), ETH_TX_RESPONSE_TYPE_URL)
                .unwrap();
        assert!(result.failed());
        assert_eq!(result.vm_error.as_deref(), Some("execution reverted"));
        assert!(result.logs.is_empty());
    }

    #[test]
    fn missing_indices_fall_back_to_position() {
        let response = MsgEthereumTxResponse {
            logs: vec![log(0, &["0x01"]), log(0, &["0x02"]), log(0, &["0x03"])],
            ..Default::default()
        };
        let result =
            decode_execution_result("k", &encode(&response, true), ETH_TX_RESPONSE_TYPE_URL)
                .unwrap();
        let indices: Vec<u32> = result.logs.iter().map(|l| l.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn legacy_data_list_is_searched() {
        let response = MsgEthereumTxResponse {
            gas_used: 99,
            ..Default::default()
        };
        let result =
            decode_execution_result("k", &encode(&response, false), ETH_TX_RESPONSE_TYPE_URL)
                .unwrap();
        assert_eq!(result.gas_used, 99);
    }

    #[test]
    fn unknown_type_not_found() {
        let response = MsgEthereumTxResponse::default();
        let err = decode_execution_result("k", &encode(&response, true), "/other.v1.MsgResponse")
            .unwrap_err();
        assert!(matches!(err, CodecError::ResponseNotFound { .. }));
    }

    #[test]
    fn garbage_bytes_fail() {
        assert!(decode_execution_result("k", "0xffffffff", ETH_TX_RESPONSE_TYPE_URL).is_err());
    }
}
