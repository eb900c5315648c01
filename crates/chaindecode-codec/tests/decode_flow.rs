//! End-to-end codec tests: a signed envelope and its execution response go
//! through every decode stage the pipeline uses.

use alloy_primitives::{Address, Bytes, U256};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chaindecode_codec::{
    classify::TRANSFER_TOPIC,
    classify_logs,
    decode_execution_result, decode_transaction, derive_contract_address,
    response::{Any, Log, MsgEthereumTxResponse, TxMsgData},
    track_creation,
    transaction::address_hex,
    CodecError, TxEnvelope, TxSignature, TxType, ETH_TX_RESPONSE_TYPE_URL,
};
use chaindecode_core::{ExecStatus, TokenStandard};
use k256::ecdsa::SigningKey;
use prost::Message;

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn signing_key() -> SigningKey {
    SigningKey::from_slice(&[0x2a; 32]).unwrap()
}

fn signed(to: Option<Address>, nonce: u64, input: Vec<u8>) -> TxEnvelope {
    let mut env = TxEnvelope {
        tx_type: TxType::DynamicFee,
        chain_id: Some(9001),
        nonce,
        gas_price: None,
        max_priority_fee_per_gas: Some(U256::from(1u64)),
        max_fee_per_gas: Some(U256::from(2_000_000_000u64)),
        gas_limit: U256::from(500_000u64),
        to,
        value: U256::ZERO,
        input: Bytes::from(input),
        access_list: Bytes::from_static(&[0xc0]),
        signature: TxSignature { v: 0, r: U256::ZERO, s: U256::ZERO },
    };
    let (sig, recid) = signing_key()
        .sign_prehash_recoverable(&env.signing_hash())
        .unwrap();
    let bytes = sig.to_bytes();
    env.signature = TxSignature {
        v: recid.to_byte() as u64,
        r: U256::from_be_slice(&bytes[..32]),
        s: U256::from_be_slice(&bytes[32..]),
    };
    env
}

fn response_hex(response: MsgEthereumTxResponse) -> String {
    let msg = TxMsgData {
        data: vec![],
        msg_responses: vec![Any {
            type_url: ETH_TX_RESPONSE_TYPE_URL.into(),
            value: response.encode_to_vec(),
        }],
    };
    hex::encode(msg.encode_to_vec())
}

fn addr_topic(byte: u8) -> String {
    format!("0x{}{}", "00".repeat(12), format!("{byte:02x}").repeat(20))
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn erc20_transfer_transaction() {
    let token = Address::repeat_byte(0x77);
    let mut input = hex::decode("a9059cbb").unwrap();
    input.extend([0u8; 64]);
    let env = signed(Some(token), 3, input);
    let payload = STANDARD.encode(env.encode());

    let (_, tx) = decode_transaction("host-1", 1_000, &payload).unwrap();
    assert_eq!(tx.status, ExecStatus::Success);
    assert_eq!(tx.to.as_deref(), Some(address_hex(&token).as_str()));
    assert_eq!(tx.chain_id, Some(9001));
    assert_eq!(tx.tx_type, 2);
    assert!(tx.from.is_some());

    let mut amount = vec![0u8; 32];
    amount[31] = 0x64;
    let response = MsgEthereumTxResponse {
        logs: vec![Log {
            address: address_hex(&token),
            topics: vec![TRANSFER_TOPIC.into(), addr_topic(0xaa), addr_topic(0xbb)],
            data: amount,
            index: 0,
            ..Default::default()
        }],
        gas_used: 34_500,
        ..Default::default()
    };
    let result =
        decode_execution_result("host-1", &response_hex(response), ETH_TX_RESPONSE_TYPE_URL)
            .unwrap();
    assert_eq!(result.gas_used, 34_500);

    let c = classify_logs(&result.logs);
    assert_eq!(c.transfers.len(), 1);
    assert_eq!(c.transfers[0].value, "100");
    assert_eq!(c.transfers[0].standard, TokenStandard::Erc20);
    assert_eq!(c.tokens[0].address, address_hex(&token));
}

#[test]
fn contract_creation_transaction() {
    let env = signed(None, 5, vec![0x60, 0x80, 0x60, 0x40, 0x52]);
    let (envelope, mut tx) = decode_transaction("host-2", 2_000, &hex::encode(env.encode())).unwrap();
    assert!(tx.is_contract_creation());

    let contract = track_creation(&mut tx).unwrap();
    let sender = envelope.recover_sender().unwrap();
    assert_eq!(contract.address, address_hex(&derive_contract_address(&sender, 5)));
    assert_eq!(contract.creator, address_hex(&sender));
    assert_eq!(tx.contract_address.as_deref(), Some(contract.address.as_str()));
}

#[test]
fn repeated_decode_is_deterministic() {
    let env = signed(Some(Address::repeat_byte(0x01)), 0, vec![]);
    let payload = format!("0x{}", hex::encode(env.encode()));
    let (_, a) = decode_transaction("k", 1, &payload).unwrap();
    let (_, b) = decode_transaction("k", 1, &payload).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.hash, Some(env.hash()));
}

#[test]
fn garbage_envelope_is_rejected() {
    let err = decode_transaction("k", 1, "0xdeadbeef").unwrap_err();
    assert!(matches!(err, CodecError::Rlp(_)));
}
