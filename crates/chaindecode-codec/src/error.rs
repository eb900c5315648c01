//! Error types for the decode codecs.

use thiserror::Error;

/// Errors raised while decoding envelopes, execution results and logs.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid payload encoding: {0}")]
    InvalidEncoding(String),

    #[error("RLP error: {0}")]
    Rlp(#[from] alloy_rlp::Error),

    #[error("unsupported transaction type 0x{0:02x}")]
    UnsupportedTxType(u8),

    #[error("{0} trailing bytes after envelope")]
    TrailingBytes(usize),

    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("protobuf decode error: {0}")]
    Protobuf(#[from] prost::DecodeError),

    #[error("no response of type '{type_url}' in execution result")]
    ResponseNotFound { type_url: String },

    #[error("malformed log at index {index}: {reason}")]
    MalformedLog { index: u32, reason: String },

    #[error("ABI error: {0}")]
    Abi(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_type_byte() {
        assert_eq!(
            CodecError::UnsupportedTxType(0x7e).to_string(),
            "unsupported transaction type 0x7e"
        );
    }
}
