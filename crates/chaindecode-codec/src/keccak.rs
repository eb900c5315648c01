//! keccak-256 helpers.

use tiny_keccak::{Hasher, Keccak};

/// keccak-256 of `data`.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

/// keccak-256 of `data` as `0x` + 64 lowercase hex.
pub fn keccak256_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(keccak256(data)))
}

/// keccak-256 of a canonical event signature, e.g. `Transfer(address,address,uint256)`.
pub fn event_topic(signature: &str) -> String {
    keccak256_hex(signature.as_bytes())
}
