//! Shared fixtures for the backend tests.

use alloy_primitives::{Bytes, U256};
use chaindecode_core::{
    Contract, DecodedBundle, DecodedTransaction, ExecStatus, LogEntry, TokenStandard,
    TokenTransfer,
};

pub const TOKEN: &str = "0x1111111111111111111111111111111111111111";
pub const CONTRACT: &str = "0x2222222222222222222222222222222222222222";
pub const CREATOR: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

/// A decoded bundle with one log and one ERC-20 transfer.
pub fn bundle(key: &str, hash: &str) -> DecodedBundle {
    let mut tx = DecodedTransaction::sentinel(key, 10, "");
    tx.status = ExecStatus::Success;
    tx.error = None;
    tx.hash = Some(hash.to_string());
    tx.from = Some(CREATOR.into());
    tx.to = Some(TOKEN.into());
    tx.nonce = 3;
    tx.gas_limit = U256::from(90_000u64);
    tx.gas_price = Some(U256::from(7u64));
    tx.value = U256::MAX;
    tx.input = Bytes::from(vec![0xa9, 0x05, 0x9c, 0xbb]);
    tx.tx_type = 2;
    tx.chain_id = Some(9000);
    tx.gas_used = Some(21_000);
    tx.decoded_args = Some(serde_json::json!({ "arg0": "1" }));

    let mut b = DecodedBundle::new(tx);
    b.logs.push(LogEntry {
        tx_key: key.into(),
        index: 0,
        address: TOKEN.into(),
        topics: vec![format!("0x{:064x}", 1)],
        data: Bytes::from(vec![0u8; 32]),
    });
    b.transfers.push(TokenTransfer {
        tx_key: key.into(),
        log_index: 0,
        token: TOKEN.into(),
        from: CREATOR.into(),
        to: CONTRACT.into(),
        value: "1".into(),
        standard: TokenStandard::Erc20,
    });
    b
}

pub fn contract(creation_tx: &str, bytecode_hash: Option<&str>) -> Contract {
    Contract {
        address: CONTRACT.into(),
        creator: CREATOR.into(),
        creation_tx: creation_tx.into(),
        creation_height: 10,
        bytecode_hash: bytecode_hash.map(str::to_string),
    }
}
