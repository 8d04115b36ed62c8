//! Function-call encoding: 4-byte selector followed by ABI parameters.

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{Bytes, FixedBytes, keccak256};
use std::fmt::{self, Display, Formatter};

use super::registry;
use super::tag::{EncodingSpec, TypeTag};
use crate::errors::{ProtocolError, ProtocolResult};

/// A contract function described at runtime by its name and parameter spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionCall {
    name: String,
    inputs: EncodingSpec,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, inputs: EncodingSpec) -> Self {
        Self {
            name: name.into(),
            inputs,
        }
    }

    /// Parse a signature such as `setDefaultRoyaltyInfo(address,uint256)`.
    ///
    /// # Errors
    /// [`ProtocolError::EncodingMismatch`] on a malformed signature,
    /// [`ProtocolError::UnknownTypeTag`] on an unsupported parameter type.
    pub fn parse(signature: &str) -> ProtocolResult<Self> {
        let signature = signature.trim();
        let malformed =
            || ProtocolError::EncodingMismatch(format!("malformed function signature '{signature}'"));
        let open = signature.find('(').ok_or_else(malformed)?;
        let name = &signature[..open];
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(malformed());
        }
        let inputs = match TypeTag::parse(&signature[open..])? {
            TypeTag::Tuple(tags) => EncodingSpec::new(tags),
            _ => return Err(malformed()),
        };
        Ok(Self::new(name, inputs))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &EncodingSpec {
        &self.inputs
    }

    /// Canonical signature, e.g. `lazyMint(uint256,string,bytes)`.
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.inputs.canonical_params())
    }

    /// First four bytes of the keccak-256 hash of the canonical signature.
    pub fn selector(&self) -> FixedBytes<4> {
        let hash = keccak256(self.signature().as_bytes());
        FixedBytes::from_slice(&hash[..4])
    }

    /// Selector followed by the encoded arguments.
    pub fn encode(&self, values: &[DynSolValue]) -> ProtocolResult<Bytes> {
        let params = registry::encode(&self.inputs, values)?;
        Ok(self.with_selector(params))
    }

    /// Same as [`FunctionCall::encode`] with JSON arguments.
    pub fn encode_json(&self, values: &[serde_json::Value]) -> ProtocolResult<Bytes> {
        let params = registry::encode_json(&self.inputs, values)?;
        Ok(self.with_selector(params))
    }

    /// Split calldata produced for this function back into argument values.
    pub fn decode(&self, calldata: &[u8]) -> ProtocolResult<Vec<DynSolValue>> {
        match calldata.split_first_chunk::<4>() {
            Some((selector, params)) if *selector == self.selector().0 => {
                registry::decode(&self.inputs, params)
            }
            _ => Err(ProtocolError::EncodingMismatch(format!(
                "calldata does not start with the selector of {}",
                self.signature()
            ))),
        }
    }

    fn with_selector(&self, params: Vec<u8>) -> Bytes {
        let mut data = Vec::with_capacity(4 + params.len());
        data.extend_from_slice(self.selector().as_slice());
        data.extend_from_slice(&params);
        data.into()
    }
}

impl Display for FunctionCall {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}
