//! Contract deployment tracking (CREATE only; no CREATE2).

use alloy_primitives::Address;
use alloy_rlp::{Encodable, Header};
use chaindecode_core::{Contract, DecodedTransaction, ExecStatus};
use std::str::FromStr;

use crate::keccak::{keccak256, keccak256_hex};
use crate::transaction::address_hex;

/// Address of a contract created by `sender` at `nonce`:
/// the last 20 bytes of `keccak256(rlp([sender, nonce]))`.
pub fn derive_contract_address(sender: &Address, nonce: u64) -> Address {
    let mut payload = Vec::with_capacity(32);
    sender.encode(&mut payload);
    nonce.encode(&mut payload);

    let mut out = Vec::with_capacity(payload.len() + 1);
    Header {
        list: true,
        payload_length: payload.len(),
    }
    .encode(&mut out);
    out.extend_from_slice(&payload);

    Address::from_slice(&keccak256(&out)[12..])
}

/// Record the deployment made by `tx`, if any.
///
/// Only a successful contract-creation transaction with a known sender
/// deploys a contract. On a match, `tx.contract_address` is stamped.
pub fn track_creation(tx: &mut DecodedTransaction) -> Option<Contract> {
    if tx.to.is_some() || tx.status != ExecStatus::Success {
        return None;
    }
    let creator = tx.from.as_deref()?;
    let sender = Address::from_str(creator).ok()?;

    let address = address_hex(&derive_contract_address(&sender, tx.nonce));
    let bytecode_hash = (!tx.input.is_empty()).then(|| keccak256_hex(&tx.input));

    tx.contract_address = Some(address.clone());
    Some(Contract {
        address,
        creator: creator.to_ascii_lowercase(),
        creation_tx: tx.tx_key.clone(),
        creation_height: tx.height,
        bytecode_hash,
    })
}
