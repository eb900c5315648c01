//! Call-argument decoding against a human-readable function signature.
//!
//! Signatures from a selector database carry no parameter names, so arguments
//! are keyed `arg0`, `arg1`, … unless the signature names them.

use alloy_core::dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy_json_abi::Function;
use serde_json::{Map, Value};

use crate::error::CodecError;

/// Leading 4-byte selector of `calldata`.
pub fn selector(calldata: &[u8]) -> Option<[u8; 4]> {
    calldata.get(..4).and_then(|s| s.try_into().ok())
}

/// Function name of a signature such as `transfer(address,uint256)`.
pub fn function_name(signature: &str) -> &str {
    signature.split('(').next().unwrap_or(signature).trim()
}

/// Decode `calldata` (selector included) against `signature`.
///
/// Returns a JSON object with one entry per parameter. Integers are rendered
/// as decimal strings so full 256-bit values survive.
pub fn decode_arguments(signature: &str, calldata: &[u8]) -> Result<Value, CodecError> {
    let func = Function::parse(signature)
        .map_err(|e| CodecError::Abi(format!("invalid signature '{signature}': {e}")))?;

    let sel = selector(calldata)
        .ok_or_else(|| CodecError::Abi(format!("calldata too short: {} bytes", calldata.len())))?;
    if func.selector().as_slice() != sel.as_slice() {
        return Err(CodecError::Abi(format!(
            "selector 0x{} does not match '{signature}'",
            hex::encode(sel)
        )));
    }

    let types = func
        .inputs
        .iter()
        .map(|p| p.resolve().map_err(|e| CodecError::Abi(e.to_string())))
        .collect::<Result<Vec<DynSolType>, _>>()?;

    let decoded = DynSolType::Tuple(types)
        .abi_decode_params(&calldata[4..])
        .map_err(|e| CodecError::Abi(format!("argument decode: {e}")))?;

    let values = match decoded {
        DynSolValue::Tuple(vals) => vals,
        other => vec![other],
    };

    let mut args = Map::new();
    for (i, (param, value)) in func.inputs.iter().zip(values).enumerate() {
        let name = if param.name.is_empty() {
            format!("arg{i}")
        } else {
            param.name.clone()
        };
        args.insert(name, to_json(value));
    }
    Ok(Value::Object(args))
}

fn to_json(value: DynSolValue) -> Value {
    match value {
        DynSolValue::Bool(b) => Value::Bool(b),
        DynSolValue::Int(i, _) => Value::String(i.to_string()),
        DynSolValue::Uint(u, _) => Value::String(u.to_string()),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(format!("0x{}", hex::encode(&word[..size.min(32)])))
        }
        DynSolValue::Address(a) => Value::String(format!("0x{}", hex::encode(a.as_slice()))),
        DynSolValue::Function(f) => Value::String(format!("0x{}", hex::encode(f.as_slice()))),
        DynSolValue::Bytes(b) => Value::String(format!("0x{}", hex::encode(b))),
        DynSolValue::String(s) => Value::String(s),
        DynSolValue::Array(vals) | DynSolValue::FixedArray(vals) | DynSolValue::Tuple(vals) => {
            Value::Array(vals.into_iter().map(to_json).collect())
        }
        #[allow(unreachable_patterns)]
        _ => Value::Null,
    }
}
