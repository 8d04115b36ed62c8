//! Type tags and encoding specs.
//!
//! A [`TypeTag`] is the runtime description of one Solidity ABI type, built from
//! a small set of primitives composed recursively into arrays and tuples. Hooks
//! publish their expected arguments as a delimiter-separated list of tags, which
//! parses into an [`EncodingSpec`].

use alloy::dyn_abi::DynSolType;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::errors::{ProtocolError, ProtocolResult};

/// Delimiter used by hooks between tags in their self-description string.
pub const SPEC_DELIMITER: char = '|';

/// One ABI type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Address,
    Bool,
    /// `uintN`, N in bits.
    Uint(usize),
    /// `intN`, N in bits.
    Int(usize),
    /// `bytesN`, N in bytes.
    FixedBytes(usize),
    Bytes,
    String,
    /// `T[]`
    Array(Box<TypeTag>),
    /// `T[k]`
    FixedArray(Box<TypeTag>, usize),
    /// `(T1,T2,...)`
    Tuple(Vec<TypeTag>),
}

impl TypeTag {
    /// Parse a single tag such as `uint256`, `bytes32[]` or `(address,uint96)[2]`.
    ///
    /// # Errors
    /// Returns [`ProtocolError::UnknownTypeTag`] carrying the full input when any part
    /// of it is not a supported type.
    pub fn parse(input: &str) -> ProtocolResult<Self> {
        let trimmed = input.trim();
        parse_tag(trimmed).ok_or_else(|| ProtocolError::UnknownTypeTag(trimmed.to_string()))
    }

    /// Whether values of this type are encoded out-of-line (offset in the head, data in the tail).
    pub fn is_dynamic(&self) -> bool {
        match self {
            TypeTag::Bytes | TypeTag::String | TypeTag::Array(_) => true,
            TypeTag::FixedArray(inner, _) => inner.is_dynamic(),
            TypeTag::Tuple(inner) => inner.iter().any(TypeTag::is_dynamic),
            _ => false,
        }
    }

    /// The equivalent alloy type, used for word-level encoding.
    pub fn to_sol_type(&self) -> DynSolType {
        match self {
            TypeTag::Address => DynSolType::Address,
            TypeTag::Bool => DynSolType::Bool,
            TypeTag::Uint(bits) => DynSolType::Uint(*bits),
            TypeTag::Int(bits) => DynSolType::Int(*bits),
            TypeTag::FixedBytes(size) => DynSolType::FixedBytes(*size),
            TypeTag::Bytes => DynSolType::Bytes,
            TypeTag::String => DynSolType::String,
            TypeTag::Array(inner) => DynSolType::Array(Box::new(inner.to_sol_type())),
            TypeTag::FixedArray(inner, len) => {
                DynSolType::FixedArray(Box::new(inner.to_sol_type()), *len)
            }
            TypeTag::Tuple(inner) => {
                DynSolType::Tuple(inner.iter().map(TypeTag::to_sol_type).collect())
            }
        }
    }
}

impl Display for TypeTag {
    /// Canonical form, as used in function signatures.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::Address => f.write_str("address"),
            TypeTag::Bool => f.write_str("bool"),
            TypeTag::Uint(bits) => write!(f, "uint{bits}"),
            TypeTag::Int(bits) => write!(f, "int{bits}"),
            TypeTag::FixedBytes(size) => write!(f, "bytes{size}"),
            TypeTag::Bytes => f.write_str("bytes"),
            TypeTag::String => f.write_str("string"),
            TypeTag::Array(inner) => write!(f, "{inner}[]"),
            TypeTag::FixedArray(inner, len) => write!(f, "{inner}[{len}]"),
            TypeTag::Tuple(inner) => {
                f.write_str("(")?;
                for (i, tag) in inner.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{tag}")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl FromStr for TypeTag {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypeTag::parse(s)
    }
}

fn parse_tag(s: &str) -> Option<TypeTag> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    // Array suffixes bind last: `T[2][]` is an array of `T[2]`.
    if let Some(body) = s.strip_suffix(']') {
        let open = body.rfind('[')?;
        let inner = parse_tag(&body[..open])?;
        let len = &body[open + 1..];
        return if len.is_empty() {
            Some(TypeTag::Array(Box::new(inner)))
        } else {
            let len: usize = len.parse().ok()?;
            (len > 0).then(|| TypeTag::FixedArray(Box::new(inner), len))
        };
    }

    if let Some(body) = s.strip_prefix("tuple").unwrap_or(s).strip_prefix('(') {
        let body = body.strip_suffix(')')?;
        if body.trim().is_empty() {
            return Some(TypeTag::Tuple(Vec::new()));
        }
        return split_top_level(body)?
            .into_iter()
            .map(parse_tag)
            .collect::<Option<Vec<_>>>()
            .map(TypeTag::Tuple);
    }

    match s {
        "address" => return Some(TypeTag::Address),
        "bool" => return Some(TypeTag::Bool),
        "bytes" => return Some(TypeTag::Bytes),
        "string" => return Some(TypeTag::String),
        "uint" => return Some(TypeTag::Uint(256)),
        "int" => return Some(TypeTag::Int(256)),
        _ => {}
    }

    if let Some(bits) = s.strip_prefix("uint") {
        return parse_int_bits(bits).map(TypeTag::Uint);
    }
    if let Some(bits) = s.strip_prefix("int") {
        return parse_int_bits(bits).map(TypeTag::Int);
    }
    if let Some(size) = s.strip_prefix("bytes") {
        let size: usize = digits(size)?;
        return (1..=32).contains(&size).then_some(TypeTag::FixedBytes(size));
    }
    None
}

fn parse_int_bits(s: &str) -> Option<usize> {
    let bits: usize = digits(s)?;
    (bits > 0 && bits <= 256 && bits % 8 == 0).then_some(bits)
}

/// Strict decimal: rejects signs, whitespace and leading zeros.
fn digits(s: &str) -> Option<usize> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) || s.starts_with('0') {
        return None;
    }
    s.parse().ok()
}

/// Split a tuple body on commas that are not nested inside parentheses or brackets.
fn split_top_level(body: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            ',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    parts.push(&body[start..]);
    Some(parts)
}

/// Ordered argument shape published by a hook.
///
/// Order is significant and matches the positional order of caller values.
/// An empty spec is valid and means the hook expects no arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct EncodingSpec {
    tags: Vec<TypeTag>,
}

impl EncodingSpec {
    pub fn new(tags: Vec<TypeTag>) -> Self {
        Self { tags }
    }

    /// Parse a `|`-separated self-description string such as `"address|bytes32[]"`.
    ///
    /// An empty (or all-whitespace) string yields the empty spec.
    pub fn parse(signature: &str) -> ProtocolResult<Self> {
        Self::parse_with(signature, SPEC_DELIMITER)
    }

    /// Parse with an explicit delimiter.
    pub fn parse_with(signature: &str, delimiter: char) -> ProtocolResult<Self> {
        if signature.trim().is_empty() {
            return Ok(Self::default());
        }
        let tags = signature
            .split(delimiter)
            .map(TypeTag::parse)
            .collect::<ProtocolResult<Vec<_>>>()?;
        Ok(Self { tags })
    }

    pub fn tags(&self) -> &[TypeTag] {
        &self.tags
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// The spec as a single tuple type.
    pub fn as_tuple(&self) -> TypeTag {
        TypeTag::Tuple(self.tags.clone())
    }

    /// Comma-joined canonical tags, as they appear inside a function signature.
    pub fn canonical_params(&self) -> String {
        self.tags
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Display for EncodingSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let joined = self
            .tags
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(&SPEC_DELIMITER.to_string());
        f.write_str(&joined)
    }
}

impl FromStr for EncodingSpec {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EncodingSpec::parse(s)
    }
}

impl From<Vec<TypeTag>> for EncodingSpec {
    fn from(tags: Vec<TypeTag>) -> Self {
        Self::new(tags)
    }
}
