//! Text encodings of raw payloads handed over by the ingestion engine.
//!
//! Transactions arrive as base64 or hex; execution responses as hex. Both go
//! through [`decode_payload`].

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::CodecError;

/// Decode a `0x`-prefixed hex, bare hex, or standard base64 string.
///
/// A string that is valid as both bare hex and base64 is read as hex.
pub fn decode_payload(input: &str) -> Result<Vec<u8>, CodecError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(CodecError::InvalidEncoding("empty payload".into()));
    }

    if let Some(h) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return hex::decode(h).map_err(|e| CodecError::InvalidEncoding(format!("hex: {e}")));
    }

    if s.len() % 2 == 0 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
        if let Ok(bytes) = hex::decode(s) {
            return Ok(bytes);
        }
    }

    STANDARD
        .decode(s)
        .map_err(|e| CodecError::InvalidEncoding(format!("neither hex nor base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_hex() {
        assert_eq!(decode_payload("0xdeadBEEF").unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn bare_hex_wins_over_base64() {
        // "abcd" is also valid base64 for [0x69, 0xb7, 0x1d].
        assert_eq!(decode_payload("abcd").unwrap(), vec![0xab, 0xcd]);
    }

    #[test]
    fn base64_fallback() {
        assert_eq!(decode_payload("+AE=").unwrap(), vec![0xf8, 0x01]);
        assert_eq!(decode_payload("AgE=").unwrap(), vec![0x02, 0x01]);
    }

    #[test]
    fn whitespace_is_trimmed() {
        assert_eq!(decode_payload("  0x01\n").unwrap(), vec![0x01]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_payload("").is_err());
        assert!(decode_payload("0xzz").is_err());
        assert!(decode_payload("not base64 !!").is_err());
    }
}
