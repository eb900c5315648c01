//! Row shapes shared by the SQL backends.
//!
//! Full-width integers (nonce, gas, value, chain id) are stored as decimal
//! TEXT so no backend ever narrows them. Byte strings are `0x` hex TEXT.

use alloy_primitives::{Bytes, U256};
use chaindecode_core::{
    Contract, DecodedTransaction, ExecStatus, LogEntry, PendingTx, PipelineError, Token,
    TokenStandard, TokenTransfer,
};

fn corrupt(column: &str, reason: impl std::fmt::Display) -> PipelineError {
    PipelineError::Storage(format!("corrupt column '{column}': {reason}"))
}

fn parse_u256(column: &str, s: &str) -> Result<U256, PipelineError> {
    U256::from_str_radix(s, 10).map_err(|e| corrupt(column, e))
}

fn parse_u64(column: &str, s: &str) -> Result<u64, PipelineError> {
    s.parse().map_err(|e| corrupt(column, e))
}

fn parse_hex(column: &str, s: &str) -> Result<Bytes, PipelineError> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
        .map(Bytes::from)
        .map_err(|e| corrupt(column, e))
}

fn to_hex(b: &[u8]) -> String {
    format!("0x{}", hex::encode(b))
}

// ─── pending_txs ──────────────────────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PendingRow {
    pub tx_key: String,
    pub height: i64,
    pub raw_tx: String,
    pub raw_response: Option<String>,
    pub gas_used: Option<i64>,
}

impl From<PendingRow> for PendingTx {
    fn from(r: PendingRow) -> Self {
        PendingTx {
            tx_key: r.tx_key,
            height: r.height as u64,
            raw_tx: r.raw_tx,
            raw_response: r.raw_response,
            gas_used: r.gas_used.map(|g| g as u64),
        }
    }
}

// ─── evm_transactions ─────────────────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TxRow {
    pub tx_key: String,
    pub height: i64,
    pub hash: Option<String>,
    pub from_address: Option<String>,
    pub to_address: Option<String>,
    pub nonce: String,
    pub gas_limit: String,
    pub gas_price: Option<String>,
    pub max_fee_per_gas: Option<String>,
    pub max_priority_fee_per_gas: Option<String>,
    pub value: String,
    pub input: String,
    pub tx_type: i64,
    pub chain_id: Option<String>,
    pub gas_used: Option<String>,
    pub status: String,
    pub vm_error: Option<String>,
    pub function_name: Option<String>,
    pub function_signature: Option<String>,
    pub decoded_args: Option<String>,
    pub contract_address: Option<String>,
    pub error: Option<String>,
}

pub(crate) const TX_COLUMNS: &str = "tx_key, height, hash, from_address, to_address, nonce, \
    gas_limit, gas_price, max_fee_per_gas, max_priority_fee_per_gas, value, input, tx_type, \
    chain_id, gas_used, status, vm_error, function_name, function_signature, decoded_args, \
    contract_address, error";

impl TxRow {
    pub fn from_decoded(t: &DecodedTransaction) -> Result<Self, PipelineError> {
        let decoded_args = t
            .decoded_args
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| PipelineError::Storage(e.to_string()))?;

        Ok(Self {
            tx_key: t.tx_key.clone(),
            height: t.height as i64,
            hash: t.hash.clone(),
            from_address: t.from.clone(),
            to_address: t.to.clone(),
            nonce: t.nonce.to_string(),
            gas_limit: t.gas_limit.to_string(),
            gas_price: t.gas_price.map(|v| v.to_string()),
            max_fee_per_gas: t.max_fee_per_gas.map(|v| v.to_string()),
            max_priority_fee_per_gas: t.max_priority_fee_per_gas.map(|v| v.to_string()),
            value: t.value.to_string(),
            input: to_hex(&t.input),
            tx_type: t.tx_type as i64,
            chain_id: t.chain_id.map(|v| v.to_string()),
            gas_used: t.gas_used.map(|v| v.to_string()),
            status: t.status.as_str().to_string(),
            vm_error: t.vm_error.clone(),
            function_name: t.function_name.clone(),
            function_signature: t.function_signature.clone(),
            decoded_args,
            contract_address: t.contract_address.clone(),
            error: t.error.clone(),
        })
    }

    pub fn into_decoded(self) -> Result<DecodedTransaction, PipelineError> {
        let opt_u256 = |column: &str, v: Option<String>| {
            v.map(|s| parse_u256(column, &s)).transpose()
        };
        let opt_u64 = |column: &str, v: Option<String>| {
            v.map(|s| parse_u64(column, &s)).transpose()
        };

        Ok(DecodedTransaction {
            height: self.height as u64,
            hash: self.hash,
            from: self.from_address,
            to: self.to_address,
            nonce: parse_u64("nonce", &self.nonce)?,
            gas_limit: parse_u256("gas_limit", &self.gas_limit)?,
            gas_price: opt_u256("gas_price", self.gas_price)?,
            max_fee_per_gas: opt_u256("max_fee_per_gas", self.max_fee_per_gas)?,
            max_priority_fee_per_gas: opt_u256(
                "max_priority_fee_per_gas",
                self.max_priority_fee_per_gas,
            )?,
            value: parse_u256("value", &self.value)?,
            input: parse_hex("input", &self.input)?,
            tx_type: u8::try_from(self.tx_type).map_err(|e| corrupt("tx_type", e))?,
            chain_id: opt_u64("chain_id", self.chain_id)?,
            gas_used: opt_u64("gas_used", self.gas_used)?,
            status: ExecStatus::parse(&self.status)
                .ok_or_else(|| corrupt("status", &self.status))?,
            vm_error: self.vm_error,
            function_name: self.function_name,
            function_signature: self.function_signature,
            decoded_args: self
                .decoded_args
                .map(|s| serde_json::from_str(&s))
                .transpose()
                .map_err(|e| corrupt("decoded_args", e))?,
            contract_address: self.contract_address,
            error: self.error,
            tx_key: self.tx_key,
        })
    }
}

// ─── evm_logs ─────────────────────────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct LogRow {
    pub tx_key: String,
    pub log_index: i64,
    pub address: String,
    /// JSON array of topic strings.
    pub topics: String,
    pub data: String,
}

impl LogRow {
    pub fn from_entry(l: &LogEntry) -> Result<Self, PipelineError> {
        Ok(Self {
            tx_key: l.tx_key.clone(),
            log_index: l.index as i64,
            address: l.address.clone(),
            topics: serde_json::to_string(&l.topics)
                .map_err(|e| PipelineError::Storage(e.to_string()))?,
            data: to_hex(&l.data),
        })
    }

    pub fn into_entry(self) -> Result<LogEntry, PipelineError> {
        Ok(LogEntry {
            index: u32::try_from(self.log_index).map_err(|e| corrupt("log_index", e))?,
            topics: serde_json::from_str(&self.topics).map_err(|e| corrupt("topics", e))?,
            data: parse_hex("data", &self.data)?,
            address: self.address,
            tx_key: self.tx_key,
        })
    }
}

// ─── token_transfers ──────────────────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TransferRow {
    pub tx_key: String,
    pub log_index: i64,
    pub token: String,
    pub from_address: String,
    pub to_address: String,
    pub value: String,
    pub token_type: String,
}

impl TransferRow {
    pub fn into_transfer(self) -> Result<TokenTransfer, PipelineError> {
        Ok(TokenTransfer {
            log_index: u32::try_from(self.log_index).map_err(|e| corrupt("log_index", e))?,
            standard: TokenStandard::parse(&self.token_type)
                .ok_or_else(|| corrupt("token_type", &self.token_type))?,
            tx_key: self.tx_key,
            token: self.token,
            from: self.from_address,
            to: self.to_address,
            value: self.value,
        })
    }
}

// ─── tokens / contracts ───────────────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TokenRow {
    pub address: String,
    pub token_type: String,
    pub verified: bool,
}

impl TokenRow {
    pub fn into_token(self) -> Result<Token, PipelineError> {
        Ok(Token {
            standard: TokenStandard::parse(&self.token_type)
                .ok_or_else(|| corrupt("token_type", &self.token_type))?,
            address: self.address,
            verified: self.verified,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ContractRow {
    pub address: String,
    pub creator: String,
    pub creation_tx: String,
    pub creation_height: i64,
    pub bytecode_hash: Option<String>,
}

impl From<ContractRow> for Contract {
    fn from(r: ContractRow) -> Self {
        Contract {
            address: r.address,
            creator: r.creator,
            creation_tx: r.creation_tx,
            creation_height: r.creation_height as u64,
            bytecode_hash: r.bytecode_hash,
        }
    }
}
