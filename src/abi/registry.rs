//! Tag-driven encode/decode.
//!
//! Values are checked against their declared tags before anything is encoded, so a
//! shape disagreement never reaches the wire. Word-level layout (inline statics,
//! offset + length + data for dynamics) is produced by `alloy::dyn_abi` from the
//! lowered [`TypeTag`].

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::U256;

use super::coerce;
use super::tag::{EncodingSpec, TypeTag};
use crate::errors::{ProtocolError, ProtocolResult};

/// Encode positional `values` against `spec` as ABI parameters.
///
/// # Errors
/// [`ProtocolError::EncodingMismatch`] when the value count differs from the spec
/// length or any value disagrees with its tag. Never truncates or pads.
pub fn encode(spec: &EncodingSpec, values: &[DynSolValue]) -> ProtocolResult<Vec<u8>> {
    check_values(spec, values)?;
    Ok(DynSolValue::Tuple(values.to_vec()).abi_encode_params())
}

/// Coerce loosely typed JSON values against `spec`, then encode them.
pub fn encode_json(spec: &EncodingSpec, values: &[serde_json::Value]) -> ProtocolResult<Vec<u8>> {
    let values = coerce::coerce_all(spec, values)?;
    encode(spec, &values)
}

/// Decode ABI parameters produced by [`encode`] (or by a contract) back into values.
pub fn decode(spec: &EncodingSpec, data: &[u8]) -> ProtocolResult<Vec<DynSolValue>> {
    let decoded = spec.as_tuple().to_sol_type().abi_decode_params(data)?;
    match decoded {
        DynSolValue::Tuple(values) => Ok(values),
        other => Ok(vec![other]),
    }
}

/// Verify that `values` match `spec` positionally.
pub fn check_values(spec: &EncodingSpec, values: &[DynSolValue]) -> ProtocolResult<()> {
    if values.len() != spec.len() {
        return Err(ProtocolError::EncodingMismatch(format!(
            "expected {} values for spec '{}', got {}",
            spec.len(),
            spec,
            values.len()
        )));
    }
    for (index, (tag, value)) in spec.tags().iter().zip(values).enumerate() {
        check_value(tag, value, &format!("arg{index}"))?;
    }
    Ok(())
}

/// Verify one value against one tag. `path` names the position in error messages.
pub fn check_value(tag: &TypeTag, value: &DynSolValue, path: &str) -> ProtocolResult<()> {
    let mismatch = || {
        ProtocolError::EncodingMismatch(format!(
            "{path}: expected {tag}, got {}",
            describe(value)
        ))
    };

    match (tag, value) {
        (TypeTag::Address, DynSolValue::Address(_)) => Ok(()),
        (TypeTag::Bool, DynSolValue::Bool(_)) => Ok(()),
        (TypeTag::Bytes, DynSolValue::Bytes(_)) => Ok(()),
        (TypeTag::String, DynSolValue::String(_)) => Ok(()),
        (TypeTag::Uint(bits), DynSolValue::Uint(v, size)) if bits == size => {
            if v.bit_len() > *bits {
                return Err(ProtocolError::EncodingMismatch(format!(
                    "{path}: {v} does not fit in uint{bits}"
                )));
            }
            Ok(())
        }
        (TypeTag::Int(bits), DynSolValue::Int(v, size)) if bits == size => {
            if !int_fits(v.into_raw(), *bits) {
                return Err(ProtocolError::EncodingMismatch(format!(
                    "{path}: {v} does not fit in int{bits}"
                )));
            }
            Ok(())
        }
        (TypeTag::FixedBytes(size), DynSolValue::FixedBytes(word, len)) if size == len => {
            if word[*size..].iter().any(|b| *b != 0) {
                return Err(ProtocolError::EncodingMismatch(format!(
                    "{path}: bytes{size} value has non-zero padding"
                )));
            }
            Ok(())
        }
        (TypeTag::Array(inner), DynSolValue::Array(items)) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, item)| check_value(inner, item, &format!("{path}[{i}]"))),
        (TypeTag::FixedArray(inner, len), DynSolValue::FixedArray(items)) => {
            if items.len() != *len {
                return Err(ProtocolError::EncodingMismatch(format!(
                    "{path}: expected {len} elements for {tag}, got {}",
                    items.len()
                )));
            }
            items
                .iter()
                .enumerate()
                .try_for_each(|(i, item)| check_value(inner, item, &format!("{path}[{i}]")))
        }
        (TypeTag::Tuple(inner), DynSolValue::Tuple(items)) => {
            if items.len() != inner.len() {
                return Err(ProtocolError::EncodingMismatch(format!(
                    "{path}: expected {} fields for {tag}, got {}",
                    inner.len(),
                    items.len()
                )));
            }
            inner
                .iter()
                .zip(items)
                .enumerate()
                .try_for_each(|(i, (t, item))| check_value(t, item, &format!("{path}.{i}")))
        }
        _ => Err(mismatch()),
    }
}

/// Two's-complement `raw` fits in `bits` when every bit from `bits - 1` upward equals the sign.
fn int_fits(raw: U256, bits: usize) -> bool {
    if bits >= 256 {
        return true;
    }
    let upper = raw >> (bits - 1);
    upper == U256::ZERO || upper == U256::MAX >> (bits - 1)
}

/// Short human description of a value's shape for error messages.
pub(crate) fn describe(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Address(_) => "address".to_string(),
        DynSolValue::Bool(_) => "bool".to_string(),
        DynSolValue::Uint(_, bits) => format!("uint{bits}"),
        DynSolValue::Int(_, bits) => format!("int{bits}"),
        DynSolValue::FixedBytes(_, size) => format!("bytes{size}"),
        DynSolValue::Bytes(_) => "bytes".to_string(),
        DynSolValue::String(_) => "string".to_string(),
        DynSolValue::Array(items) => format!("array of {}", items.len()),
        DynSolValue::FixedArray(items) => format!("fixed array of {}", items.len()),
        DynSolValue::Tuple(items) => format!("tuple of {}", items.len()),
        _ => "unsupported value".to_string(),
    }
}
