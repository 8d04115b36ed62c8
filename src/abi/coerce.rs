//! Coercion of loosely typed JSON values into tagged ABI values.
//!
//! Accepts the same shapes script callers pass around: integers as JSON numbers or
//! decimal / `0x` strings, addresses and byte strings as `0x` hex, arrays and tuples
//! as JSON arrays.

use alloy::dyn_abi::DynSolValue;
use alloy::hex;
use alloy::primitives::{Address, B256, I256, U256};
use serde_json::Value;
use std::str::FromStr;

use super::tag::{EncodingSpec, TypeTag};
use crate::errors::{ProtocolError, ProtocolResult};

/// Coerce one JSON value per tag of `spec`.
pub fn coerce_all(spec: &EncodingSpec, values: &[Value]) -> ProtocolResult<Vec<DynSolValue>> {
    if values.len() != spec.len() {
        return Err(ProtocolError::EncodingMismatch(format!(
            "expected {} values for spec '{}', got {}",
            spec.len(),
            spec,
            values.len()
        )));
    }
    spec.tags()
        .iter()
        .zip(values)
        .enumerate()
        .map(|(index, (tag, value))| coerce(tag, value, &format!("arg{index}")))
        .collect()
}

/// Coerce a single JSON value against `tag`.
pub fn coerce(tag: &TypeTag, value: &Value, path: &str) -> ProtocolResult<DynSolValue> {
    let mismatch = |detail: &str| {
        ProtocolError::EncodingMismatch(format!("{path}: expected {tag}, {detail}"))
    };

    match tag {
        TypeTag::Address => {
            let s = value.as_str().ok_or_else(|| mismatch("got non-string"))?;
            Address::from_str(s)
                .map(DynSolValue::Address)
                .map_err(|e| mismatch(&format!("invalid address '{s}': {e}")))
        }
        TypeTag::Bool => value
            .as_bool()
            .map(DynSolValue::Bool)
            .ok_or_else(|| mismatch("got non-boolean")),
        TypeTag::Uint(bits) => {
            let v = match value {
                Value::Number(n) => n
                    .as_u64()
                    .map(U256::from)
                    .ok_or_else(|| mismatch(&format!("got {n}")))?,
                Value::String(s) => U256::from_str(s.trim())
                    .map_err(|e| mismatch(&format!("invalid integer '{s}': {e}")))?,
                _ => return Err(mismatch("got non-integer")),
            };
            if v.bit_len() > *bits {
                return Err(mismatch(&format!("{v} out of range")));
            }
            Ok(DynSolValue::Uint(v, *bits))
        }
        TypeTag::Int(bits) => {
            let v = match value {
                Value::Number(n) => n
                    .as_i64()
                    .and_then(|i| I256::try_from(i).ok())
                    .ok_or_else(|| mismatch(&format!("got {n}")))?,
                Value::String(s) => parse_signed(s.trim())
                    .ok_or_else(|| mismatch(&format!("invalid integer '{s}'")))?,
                _ => return Err(mismatch("got non-integer")),
            };
            let out = DynSolValue::Int(v, *bits);
            super::registry::check_value(tag, &out, path)?;
            Ok(out)
        }
        TypeTag::FixedBytes(size) => {
            let bytes = hex_bytes(value).map_err(|d| mismatch(&d))?;
            if bytes.len() != *size {
                return Err(mismatch(&format!("got {} bytes", bytes.len())));
            }
            Ok(DynSolValue::FixedBytes(B256::right_padding_from(&bytes), *size))
        }
        TypeTag::Bytes => hex_bytes(value)
            .map(DynSolValue::Bytes)
            .map_err(|d| mismatch(&d)),
        TypeTag::String => value
            .as_str()
            .map(|s| DynSolValue::String(s.to_string()))
            .ok_or_else(|| mismatch("got non-string")),
        TypeTag::Array(inner) => {
            let items = value.as_array().ok_or_else(|| mismatch("got non-array"))?;
            items
                .iter()
                .enumerate()
                .map(|(i, item)| coerce(inner, item, &format!("{path}[{i}]")))
                .collect::<ProtocolResult<Vec<_>>>()
                .map(DynSolValue::Array)
        }
        TypeTag::FixedArray(inner, len) => {
            let items = value.as_array().ok_or_else(|| mismatch("got non-array"))?;
            if items.len() != *len {
                return Err(mismatch(&format!("got {} elements", items.len())));
            }
            items
                .iter()
                .enumerate()
                .map(|(i, item)| coerce(inner, item, &format!("{path}[{i}]")))
                .collect::<ProtocolResult<Vec<_>>>()
                .map(DynSolValue::FixedArray)
        }
        TypeTag::Tuple(inner) => {
            let items = value.as_array().ok_or_else(|| mismatch("got non-array"))?;
            if items.len() != inner.len() {
                return Err(mismatch(&format!("got {} fields", items.len())));
            }
            inner
                .iter()
                .zip(items)
                .enumerate()
                .map(|(i, (t, item))| coerce(t, item, &format!("{path}.{i}")))
                .collect::<ProtocolResult<Vec<_>>>()
                .map(DynSolValue::Tuple)
        }
    }
}

fn parse_signed(s: &str) -> Option<I256> {
    match s.strip_prefix('-') {
        Some(rest) if rest.starts_with("0x") => I256::from_hex_str(s).ok(),
        None if s.starts_with("0x") => I256::from_hex_str(s).ok(),
        _ => I256::from_dec_str(s).ok(),
    }
}

fn hex_bytes(value: &Value) -> Result<Vec<u8>, String> {
    let s = value.as_str().ok_or_else(|| "got non-string".to_string())?;
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| format!("hex string '{s}' lacks 0x prefix"))?;
    hex::decode(digits).map_err(|e| format!("invalid hex '{s}': {e}"))
}
