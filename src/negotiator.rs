//! Argument negotiation with a hook contract.
//!
//! Each hook publishes the shape of the arguments it expects as a `|`-separated
//! type-tag string (for example `"bytes32[]"` for an allowlist proof). The client
//! reads that string at call time and encodes caller values against it, rather than
//! compiling in an ABI per hook.

use alloy::primitives::{Address, Bytes};
use tracing::instrument;

use crate::abi::{self, DynSolValue, EncodingSpec, FunctionCall, TypeTag};
use crate::errors::{ProtocolError, ProtocolResult};
use crate::transport::Transport;

/// Self-description entry point of before-mint hooks.
pub const DEFAULT_SIGNATURE_FUNCTION: &str = "getBeforeMintArgSignature";

/// Ask `hook` for its argument signature by calling the zero-argument
/// `signature_function` and parse the result.
///
/// # Errors
/// - [`ProtocolError::UnknownTypeTag`] if the hook publishes a tag the registry cannot encode.
/// - [`ProtocolError::Reverted`] / [`ProtocolError::Transport`] if the read fails.
#[instrument(skip_all, fields(hook = %hook, function = signature_function))]
pub async fn negotiate<T: Transport + ?Sized>(
    transport: &T,
    hook: Address,
    signature_function: &str,
) -> ProtocolResult<EncodingSpec> {
    let query = FunctionCall::parse(&format!("{signature_function}()"))?;
    let raw = transport.call(hook, query.encode(&[])?).await?;

    let signature = match abi::decode(&EncodingSpec::new(vec![TypeTag::String]), &raw)?.pop() {
        Some(DynSolValue::String(signature)) => signature,
        other => {
            return Err(ProtocolError::EncodingMismatch(format!(
                "{query} returned {other:?}, expected a string"
            )));
        }
    };

    let spec = EncodingSpec::parse(&signature).inspect_err(|e| {
        tracing::warn!(%signature, error = %e, "Hook published an unsupported argument signature");
    })?;
    tracing::debug!(%spec, "Negotiated hook argument encoding");
    Ok(spec)
}

/// Encode typed values against a negotiated spec.
pub fn encode_args(spec: &EncodingSpec, values: &[DynSolValue]) -> ProtocolResult<Bytes> {
    abi::encode(spec, values).map(Bytes::from)
}

/// Encode JSON values against a negotiated spec.
pub fn encode_json_args(spec: &EncodingSpec, values: &[serde_json::Value]) -> ProtocolResult<Bytes> {
    abi::encode_json(spec, values).map(Bytes::from)
}
