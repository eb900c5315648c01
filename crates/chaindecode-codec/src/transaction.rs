//! EVM transaction envelope codec.
//!
//! Supports the three envelope formats found on EVM-compatible host chains:
//!
//! | first byte | format                  | fields |
//! |------------|-------------------------|--------|
//! | `>= 0xc0`  | legacy RLP list          | 9      |
//! | `0x01`     | EIP-2930 access-list     | 11     |
//! | `0x02`     | EIP-1559 dynamic-fee     | 12     |
//!
//! Integers must be canonical RLP, so `TxEnvelope::decode(b)?.encode() == b`
//! for every accepted input and the content hash is stable.

use alloy_primitives::{Address, Bytes, U256};
use alloy_rlp::{Decodable, Encodable, Header, EMPTY_STRING_CODE};
use chaindecode_core::{DecodedTransaction, ExecStatus};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;

use crate::error::CodecError;
use crate::keccak::{keccak256, keccak256_hex};
use crate::payload::decode_payload;

// ─── TxType ───────────────────────────────────────────────────────────────────

/// EIP-2718 envelope type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxType {
    Legacy,
    AccessList,
    DynamicFee,
}

impl TxType {
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Legacy => 0x00,
            Self::AccessList => 0x01,
            Self::DynamicFee => 0x02,
        }
    }
}

/// The `(v, r, s)` triple. For typed envelopes `v` is the y-parity (0 or 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxSignature {
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

// ─── TxEnvelope ───────────────────────────────────────────────────────────────

/// A decoded transaction envelope, field for field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxEnvelope {
    pub tx_type: TxType,
    /// Explicit for typed envelopes; derived from `v` for legacy ones.
    pub chain_id: Option<u64>,
    pub nonce: u64,
    /// Set for legacy and access-list envelopes.
    pub gas_price: Option<U256>,
    /// Set for dynamic-fee envelopes.
    pub max_priority_fee_per_gas: Option<U256>,
    /// Set for dynamic-fee envelopes.
    pub max_fee_per_gas: Option<U256>,
    pub gas_limit: U256,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub value: U256,
    pub input: Bytes,
    /// Raw RLP list item; empty for legacy envelopes.
    pub access_list: Bytes,
    pub signature: TxSignature,
}

impl TxEnvelope {
    /// Decode canonical envelope bytes.
    ///
    /// # Errors
    /// Every error is terminal: the same bytes will never decode.
    pub fn decode(raw: &[u8]) -> Result<Self, CodecError> {
        let first = *raw.first().ok_or(alloy_rlp::Error::InputTooShort)?;
        let mut buf = raw;

        let envelope = if first >= 0xc0 {
            Self::decode_legacy(&mut buf)?
        } else {
            match first {
                0x01 => {
                    buf = &buf[1..];
                    Self::decode_typed(TxType::AccessList, &mut buf)?
                }
                0x02 => {
                    buf = &buf[1..];
                    Self::decode_typed(TxType::DynamicFee, &mut buf)?
                }
                b if b < 0x80 => return Err(CodecError::UnsupportedTxType(b)),
                _ => return Err(alloy_rlp::Error::UnexpectedString.into()),
            }
        };

        if !buf.is_empty() {
            return Err(CodecError::TrailingBytes(buf.len()));
        }
        Ok(envelope)
    }

    fn decode_legacy(buf: &mut &[u8]) -> Result<Self, CodecError> {
        let mut p = open_list(buf)?;
        let nonce = u64::decode(&mut p)?;
        let gas_price = U256::decode(&mut p)?;
        let gas_limit = U256::decode(&mut p)?;
        let to = decode_to(&mut p)?;
        let value = U256::decode(&mut p)?;
        let input = Bytes::decode(&mut p)?;
        let signature = decode_signature(&mut p)?;
        ensure_consumed(p)?;

        let chain_id = match signature.v {
            v if v >= 35 => Some((v - 35) / 2),
            _ => None,
        };

        Ok(Self {
            tx_type: TxType::Legacy,
            chain_id,
            nonce,
            gas_price: Some(gas_price),
            max_priority_fee_per_gas: None,
            max_fee_per_gas: None,
            gas_limit,
            to,
            value,
            input,
            access_list: Bytes::new(),
            signature,
        })
    }

    fn decode_typed(tx_type: TxType, buf: &mut &[u8]) -> Result<Self, CodecError> {
        let mut p = open_list(buf)?;
        let chain_id = u64::decode(&mut p)?;
        let nonce = u64::decode(&mut p)?;

        let (gas_price, max_priority_fee_per_gas, max_fee_per_gas) = match tx_type {
            TxType::DynamicFee => {
                let priority = U256::decode(&mut p)?;
                let max_fee = U256::decode(&mut p)?;
                (None, Some(priority), Some(max_fee))
            }
            _ => (Some(U256::decode(&mut p)?), None, None),
        };

        let gas_limit = U256::decode(&mut p)?;
        let to = decode_to(&mut p)?;
        let value = U256::decode(&mut p)?;
        let input = Bytes::decode(&mut p)?;
        let access_list = take_list_item(&mut p)?;
        let signature = decode_signature(&mut p)?;
        ensure_consumed(p)?;

        if signature.v > 1 {
            return Err(CodecError::InvalidField {
                field: "y_parity",
                reason: format!("expected 0 or 1, got {}", signature.v),
            });
        }

        Ok(Self {
            tx_type,
            chain_id: Some(chain_id),
            nonce,
            gas_price,
            max_priority_fee_per_gas,
            max_fee_per_gas,
            gas_limit,
            to,
            value,
            input,
            access_list,
            signature,
        })
    }

    /// Re-encode into canonical envelope bytes (type byte included).
    pub fn encode(&self) -> Vec<u8> {
        self.wrap(self.fields(true))
    }

    /// The bytes the sender signed (EIP-155 for legacy, EIP-2718 for typed).
    pub fn signing_payload(&self) -> Vec<u8> {
        self.wrap(self.fields(false))
    }

    /// keccak-256 of [`signing_payload`](Self::signing_payload).
    pub fn signing_hash(&self) -> [u8; 32] {
        keccak256(&self.signing_payload())
    }

    /// Content hash: keccak-256 of the canonical encoding.
    pub fn hash(&self) -> String {
        keccak256_hex(&self.encode())
    }

    /// Recover the sender via secp256k1 public-key recovery.
    ///
    /// Returns `None` when the signature is invalid; that is not a decode failure.
    pub fn recover_sender(&self) -> Option<Address> {
        let mut parity = self.recovery_parity()?;

        let mut rs = [0u8; 64];
        rs[..32].copy_from_slice(&self.signature.r.to_be_bytes::<32>());
        rs[32..].copy_from_slice(&self.signature.s.to_be_bytes::<32>());
        let mut sig = Signature::from_slice(&rs).ok()?;
        if let Some(normalized) = sig.normalize_s() {
            sig = normalized;
            parity ^= 1;
        }

        let recid = RecoveryId::from_byte(parity)?;
        let key = VerifyingKey::recover_from_prehash(&self.signing_hash(), &sig, recid).ok()?;
        let point = k256::PublicKey::from(&key).to_encoded_point(false);
        let digest = keccak256(&point.as_bytes()[1..]);
        Some(Address::from_slice(&digest[12..]))
    }

    /// Build the decoded record. Status defaults to success until the
    /// execution result says otherwise.
    pub fn to_decoded(&self, tx_key: &str, height: u64, hash: String) -> DecodedTransaction {
        DecodedTransaction {
            tx_key: tx_key.to_string(),
            height,
            hash: Some(hash),
            from: self.recover_sender().map(|a| address_hex(&a)),
            to: self.to.map(|a| address_hex(&a)),
            nonce: self.nonce,
            gas_limit: self.gas_limit,
            gas_price: self.gas_price,
            max_fee_per_gas: self.max_fee_per_gas,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
            value: self.value,
            input: self.input.clone(),
            tx_type: self.tx_type.as_u8(),
            chain_id: self.chain_id,
            gas_used: None,
            status: ExecStatus::Success,
            vm_error: None,
            function_name: None,
            function_signature: None,
            decoded_args: None,
            contract_address: None,
            error: None,
        }
    }

    fn recovery_parity(&self) -> Option<u8> {
        let v = self.signature.v;
        match self.tx_type {
            TxType::Legacy => match v {
                27 | 28 => Some((v - 27) as u8),
                v if v >= 35 => Some(((v - 35) % 2) as u8),
                _ => None,
            },
            _ => match v {
                0 | 1 => Some(v as u8),
                _ => None,
            },
        }
    }

    fn fields(&self, with_signature: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(128 + self.input.len() + self.access_list.len());

        if self.tx_type == TxType::Legacy {
            self.nonce.encode(&mut out);
            self.gas_price.unwrap_or_default().encode(&mut out);
            self.gas_limit.encode(&mut out);
            encode_to(self.to, &mut out);
            self.value.encode(&mut out);
            self.input.encode(&mut out);
            if with_signature {
                self.signature.v.encode(&mut out);
                self.signature.r.encode(&mut out);
                self.signature.s.encode(&mut out);
            } else if let Some(chain_id) = self.chain_id {
                chain_id.encode(&mut out);
                0u64.encode(&mut out);
                0u64.encode(&mut out);
            }
            return out;
        }

        self.chain_id.unwrap_or_default().encode(&mut out);
        self.nonce.encode(&mut out);
        if self.tx_type == TxType::DynamicFee {
            self.max_priority_fee_per_gas.unwrap_or_default().encode(&mut out);
            self.max_fee_per_gas.unwrap_or_default().encode(&mut out);
        } else {
            self.gas_price.unwrap_or_default().encode(&mut out);
        }
        self.gas_limit.encode(&mut out);
        encode_to(self.to, &mut out);
        self.value.encode(&mut out);
        self.input.encode(&mut out);
        if self.access_list.is_empty() {
            Header { list: true, payload_length: 0 }.encode(&mut out);
        } else {
            out.extend_from_slice(&self.access_list);
        }
        if with_signature {
            self.signature.v.encode(&mut out);
            self.signature.r.encode(&mut out);
            self.signature.s.encode(&mut out);
        }
        out
    }

    fn wrap(&self, payload: Vec<u8>) -> Vec<u8> {
        let mut out = Vec::with_capacity(payload.len() + 10);
        if self.tx_type != TxType::Legacy {
            out.push(self.tx_type.as_u8());
        }
        Header {
            list: true,
            payload_length: payload.len(),
        }
        .encode(&mut out);
        out.extend_from_slice(&payload);
        out
    }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

/// Decode a text-encoded (hex or base64) envelope into a [`DecodedTransaction`].
///
/// The content hash is taken over the raw envelope bytes, which equal the
/// canonical encoding for every accepted input.
pub fn decode_transaction(
    tx_key: &str,
    height: u64,
    payload: &str,
) -> Result<(TxEnvelope, DecodedTransaction), CodecError> {
    let raw = decode_payload(payload)?;
    let envelope = TxEnvelope::decode(&raw)?;
    let decoded = envelope.to_decoded(tx_key, height, keccak256_hex(&raw));
    Ok((envelope, decoded))
}

/// Lowercase `0x` hex for an address.
pub fn address_hex(addr: &Address) -> String {
    format!("0x{}", hex::encode(addr.as_slice()))
}

// ─── RLP helpers ──────────────────────────────────────────────────────────────

/// Consume a list header and return its payload.
fn open_list<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], CodecError> {
    let header = Header::decode(buf)?;
    if !header.list {
        return Err(alloy_rlp::Error::UnexpectedString.into());
    }
    if buf.len() < header.payload_length {
        return Err(alloy_rlp::Error::InputTooShort.into());
    }
    let (payload, rest) = buf.split_at(header.payload_length);
    *buf = rest;
    Ok(payload)
}

/// Consume one list item and return it verbatim, header included.
fn take_list_item(buf: &mut &[u8]) -> Result<Bytes, CodecError> {
    let start = *buf;
    let header = Header::decode(buf)?;
    if !header.list {
        return Err(alloy_rlp::Error::UnexpectedString.into());
    }
    let total = (start.len() - buf.len()) + header.payload_length;
    if start.len() < total {
        return Err(alloy_rlp::Error::InputTooShort.into());
    }
    *buf = &start[total..];
    Ok(Bytes::copy_from_slice(&start[..total]))
}

fn decode_to(buf: &mut &[u8]) -> Result<Option<Address>, CodecError> {
    let raw = Bytes::decode(buf)?;
    match raw.len() {
        0 => Ok(None),
        20 => Ok(Some(Address::from_slice(&raw))),
        n => Err(CodecError::InvalidField {
            field: "to",
            reason: format!("expected 0 or 20 bytes, got {n}"),
        }),
    }
}

fn encode_to(to: Option<Address>, out: &mut Vec<u8>) {
    match to {
        Some(addr) => addr.encode(out),
        None => out.push(EMPTY_STRING_CODE),
    }
}

fn decode_signature(buf: &mut &[u8]) -> Result<TxSignature, CodecError> {
    Ok(TxSignature {
        v: u64::decode(buf)?,
        r: U256::decode(buf)?,
        s: U256::decode(buf)?,
    })
}

fn ensure_consumed(rest: &[u8]) -> Result<(), CodecError> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(CodecError::InvalidField {
            field: "envelope",
            reason: format!("{} bytes of unexpected extra fields", rest.len()),
        })
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;

    // EIP-155 example transaction (chain id 1, nonce 9).
    const EIP155_SIGNED: &str = "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83";
    const EIP155_SIGNING_DATA: &str = "ec098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a764000080018080";
    const EIP155_SIGNING_HASH: &str = "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53";
    const EIP155_SENDER: &str = "0x9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f";

    fn sign(mut env: TxEnvelope, key: &SigningKey) -> TxEnvelope {
        let (sig, recid) = key.sign_prehash_recoverable(&env.signing_hash()).unwrap();
        let bytes = sig.to_bytes();
        let parity = recid.to_byte() as u64;
        env.signature = TxSignature {
            v: match (env.tx_type, env.chain_id) {
                (TxType::Legacy, Some(id)) => id * 2 + 35 + parity,
                (TxType::Legacy, None) => 27 + parity,
                _ => parity,
            },
            r: U256::from_be_slice(&bytes[..32]),
            s: U256::from_be_slice(&bytes[32..]),
        };
        env
    }

    fn dynamic_fee(to: Option<Address>) -> TxEnvelope {
        TxEnvelope {
            tx_type: TxType::DynamicFee,
            chain_id: Some(9000),
            nonce: 7,
            gas_price: None,
            max_priority_fee_per_gas: Some(U256::from(1_000_000_000u64)),
            max_fee_per_gas: Some(U256::from(30_000_000_000u64)),
            gas_limit: U256::from(60_000u64),
            to,
            value: U256::from(10u64).pow(U256::from(18u64)),
            input: Bytes::from(vec![0xa9, 0x05, 0x9c, 0xbb]),
            access_list: Bytes::from_static(&[0xc0]),
            signature: TxSignature { v: 0, r: U256::ZERO, s: U256::ZERO },
        }
    }

    fn key() -> SigningKey {
        SigningKey::from_slice(&[0x11; 32]).unwrap()
    }

    fn key_address(key: &SigningKey) -> String {
        let point = k256::PublicKey::from(key.verifying_key()).to_encoded_point(false);
        let digest = keccak256(&point.as_bytes()[1..]);
        format!("0x{}", hex::encode(&digest[12..]))
    }

    #[test]
    fn eip155_signing_payload() {
        let raw = hex::decode(EIP155_SIGNED).unwrap();
        let env = TxEnvelope::decode(&raw).unwrap();
        assert_eq!(hex::encode(env.signing_payload()), EIP155_SIGNING_DATA);
        assert_eq!(hex::encode(env.signing_hash()), EIP155_SIGNING_HASH);
    }

    #[test]
    fn eip155_decodes_and_recovers_sender() {
        let raw = hex::decode(EIP155_SIGNED).unwrap();
        let env = TxEnvelope::decode(&raw).unwrap();
        assert_eq!(env.tx_type, TxType::Legacy);
        assert_eq!(env.chain_id, Some(1));
        assert_eq!(env.nonce, 9);
        assert_eq!(env.gas_limit, U256::from(21_000u64));
        assert_eq!(env.gas_price, Some(U256::from(20_000_000_000u64)));
        assert_eq!(
            address_hex(&env.to.unwrap()),
            "0x3535353535353535353535353535353535353535"
        );
        assert_eq!(env.value, U256::from(1_000_000_000_000_000_000u64));
        assert!(env.input.is_empty());
        assert_eq!(address_hex(&env.recover_sender().unwrap()), EIP155_SENDER);
        assert_eq!(env.encode(), raw);
    }

    #[test]
    fn dynamic_fee_roundtrip_and_sender() {
        let key = key();
        let to = Address::repeat_byte(0x42);
        let env = sign(dynamic_fee(Some(to)), &key);
        let raw = env.encode();
        assert_eq!(raw[0], 0x02);

        let decoded = TxEnvelope::decode(&raw).unwrap();
        assert_eq!(decoded, env);
        assert_eq!(decoded.encode(), raw);
        assert_eq!(decoded.hash(), keccak256_hex(&raw));
        assert_eq!(
            address_hex(&decoded.recover_sender().unwrap()),
            key_address(&key)
        );
    }

    #[test]
    fn access_list_is_kept_verbatim() {
        let key = key();
        // [[0x42.., [slot0]]]
        let mut item = Vec::new();
        let mut entry = Vec::new();
        Address::repeat_byte(0x42).encode(&mut entry);
        let mut keys = Vec::new();
        alloy_primitives::B256::ZERO.encode(&mut keys);
        Header { list: true, payload_length: keys.len() }.encode(&mut entry);
        entry.extend_from_slice(&keys);
        let mut outer = Vec::new();
        Header { list: true, payload_length: entry.len() }.encode(&mut outer);
        outer.extend_from_slice(&entry);
        Header { list: true, payload_length: outer.len() }.encode(&mut item);
        item.extend_from_slice(&outer);

        let mut env = dynamic_fee(Some(Address::repeat_byte(0x01)));
        env.tx_type = TxType::AccessList;
        env.gas_price = Some(U256::from(5u64));
        env.max_fee_per_gas = None;
        env.max_priority_fee_per_gas = None;
        env.access_list = Bytes::from(item.clone());
        let env = sign(env, &key);

        let raw = env.encode();
        assert_eq!(raw[0], 0x01);
        let decoded = TxEnvelope::decode(&raw).unwrap();
        assert_eq!(decoded.access_list.as_ref(), item.as_slice());
        assert_eq!(decoded.encode(), raw);
        assert_eq!(
            address_hex(&decoded.recover_sender().unwrap()),
            key_address(&key)
        );
    }

    #[test]
    fn creation_has_no_recipient() {
        let env = sign(dynamic_fee(None), &key());
        let raw = env.encode();
        let decoded = TxEnvelope::decode(&raw).unwrap();
        assert!(decoded.to.is_none());
        let record = decoded.to_decoded("key", 12, decoded.hash());
        assert!(record.to.is_none());
        assert!(record.is_contract_creation());
        assert_eq!(record.status, ExecStatus::Success);
    }

    #[test]
    fn pre_eip155_legacy_has_no_chain_id() {
        let mut env = dynamic_fee(Some(Address::repeat_byte(0x01)));
        env.tx_type = TxType::Legacy;
        env.chain_id = None;
        env.gas_price = Some(U256::from(1u64));
        env.max_fee_per_gas = None;
        env.max_priority_fee_per_gas = None;
        let key = key();
        let env = sign(env, &key);
        assert!(env.signature.v == 27 || env.signature.v == 28);

        let decoded = TxEnvelope::decode(&env.encode()).unwrap();
        assert_eq!(decoded.chain_id, None);
        assert_eq!(
            address_hex(&decoded.recover_sender().unwrap()),
            key_address(&key)
        );
    }

    #[test]
    fn unsupported_type_rejected() {
        let mut raw = sign(dynamic_fee(None), &key()).encode();
        raw[0] = 0x03;
        let err = TxEnvelope::decode(&raw).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedTxType(0x03)));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut raw = hex::decode(EIP155_SIGNED).unwrap();
        raw.push(0x00);
        assert!(matches!(
            TxEnvelope::decode(&raw),
            Err(CodecError::TrailingBytes(1))
        ));
    }

    #[test]
    fn truncated_envelope_rejected() {
        let raw = hex::decode(EIP155_SIGNED).unwrap();
        let err = TxEnvelope::decode(&raw[..40]).unwrap_err();
        assert!(matches!(err, CodecError::Rlp(_)));
        assert!(TxEnvelope::decode(&[]).is_err());
    }

    #[test]
    fn bad_signature_leaves_sender_unknown() {
        let mut env = sign(dynamic_fee(None), &key());
        env.signature.r = U256::ZERO;
        let decoded = TxEnvelope::decode(&env.encode()).unwrap();
        assert!(decoded.recover_sender().is_none());
        assert!(decoded.to_decoded("k", 1, decoded.hash()).from.is_none());
    }

    #[test]
    fn decode_transaction_from_base64() {
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        let raw = hex::decode(EIP155_SIGNED).unwrap();
        let (_, tx) = decode_transaction("host-tx", 77, &STANDARD.encode(&raw)).unwrap();
        assert_eq!(tx.tx_key, "host-tx");
        assert_eq!(tx.height, 77);
        assert_eq!(tx.hash, Some(keccak256_hex(&raw)));
        assert_eq!(tx.from.as_deref(), Some(EIP155_SENDER));
        assert_eq!(tx.tx_type, 0);

        // Same bytes, same hash.
        let (_, again) = decode_transaction("host-tx", 77, &format!("0x{EIP155_SIGNED}")).unwrap();
        assert_eq!(again.hash, tx.hash);
    }
}
