//! Flag-routed dispatch.
//!
//! Any hook-affecting operation is expressed in two layers:
//!
//! 1. the inner call, encoded exactly as if calling the hook function directly
//!    (e.g. `setDefaultRoyaltyInfo(recipient, bps)`);
//! 2. the outer envelope `hookFunctionWrite(flag, value, innerCalldata)` sent to the
//!    core, which forwards the inner bytes to the hook installed at `flag`.
//!
//! The inner bytes are a single `bytes` argument of the envelope, never spliced into
//! its argument list.

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;
use tracing::instrument;

use crate::abi::{self, DynSolValue, EncodingSpec, TypeTag};
use crate::contracts::{IHookedCore, ILazyMint, IRoyalty};
use crate::directory::HookFlag;
use crate::errors::{ProtocolError, ProtocolResult};
use crate::transport::{PreparedCall, SubmissionHandle, Transport};

/// Outer routed call submitted to the core contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedCallEnvelope {
    pub flag: HookFlag,
    /// Native currency forwarded to the hook.
    pub value: U256,
    /// Inner call for the hook.
    pub payload: Bytes,
}

impl RoutedCallEnvelope {
    pub fn new(flag: HookFlag, value: U256, payload: impl Into<Bytes>) -> Self {
        Self {
            flag,
            value,
            payload: payload.into(),
        }
    }

    /// `hookFunctionWrite(flag, value, payload)` calldata.
    pub fn write_calldata(&self) -> Bytes {
        IHookedCore::hookFunctionWriteCall {
            hookFlag: U256::from(self.flag.bits()),
            value: self.value,
            data: self.payload.clone(),
        }
        .abi_encode()
        .into()
    }

    /// `hookFunctionRead(flag, payload)` calldata.
    pub fn read_calldata(&self) -> Bytes {
        IHookedCore::hookFunctionReadCall {
            hookFlag: U256::from(self.flag.bits()),
            data: self.payload.clone(),
        }
        .abi_encode()
        .into()
    }

    /// The transaction carrying this envelope to `core`. The envelope value is both
    /// encoded in the call and attached as `msg.value`.
    pub fn to_prepared_call(&self, core: Address) -> PreparedCall {
        PreparedCall::new(core, self.write_calldata()).with_value(self.value)
    }
}

/// Wrap `payload` for routing to the hook at `flag`.
pub fn build_envelope(flag: HookFlag, value: U256, payload: impl Into<Bytes>) -> RoutedCallEnvelope {
    RoutedCallEnvelope::new(flag, value, payload)
}

/// Submit a write envelope to `core`. Confirmation is left to the caller.
#[instrument(skip_all, fields(core = %core, flag = %envelope.flag))]
pub async fn dispatch<T: Transport + ?Sized>(
    transport: &T,
    core: Address,
    envelope: &RoutedCallEnvelope,
) -> ProtocolResult<SubmissionHandle> {
    let handle = transport.submit(envelope.to_prepared_call(core)).await?;
    tracing::info!(tx = %handle.tx_hash, payload_len = envelope.payload.len(), "Dispatched routed call");
    Ok(handle)
}

/// Send a read envelope to `core` and return the hook's raw return data.
///
/// # Errors
/// [`ProtocolError::EncodingMismatch`] if the envelope carries value, which a read cannot forward.
#[instrument(skip_all, fields(core = %core, flag = %envelope.flag))]
pub async fn dispatch_read<T: Transport + ?Sized>(
    transport: &T,
    core: Address,
    envelope: &RoutedCallEnvelope,
) -> ProtocolResult<Bytes> {
    if !envelope.value.is_zero() {
        return Err(ProtocolError::EncodingMismatch(
            "read envelopes cannot carry value".to_string(),
        ));
    }
    let raw = transport.call(core, envelope.read_calldata()).await?;
    match abi::decode(&EncodingSpec::new(vec![TypeTag::Bytes]), &raw)?.pop() {
        Some(DynSolValue::Bytes(data)) => Ok(data.into()),
        other => Err(ProtocolError::EncodingMismatch(format!(
            "hookFunctionRead returned {other:?}, expected bytes"
        ))),
    }
}

/// Inner call for the metadata hook: `lazyMint(amount, baseURI, data)`.
pub fn lazy_mint_call(amount: U256, base_uri: &str, data: Bytes) -> Bytes {
    ILazyMint::lazyMintCall {
        amount,
        baseURIForTokens: base_uri.to_string(),
        data,
    }
    .abi_encode()
    .into()
}

/// Inner call for the royalty hook: `setDefaultRoyaltyInfo(recipient, bps)`. 10_000 bps is 100%.
pub fn set_default_royalty_info_call(recipient: Address, bps: U256) -> Bytes {
    IRoyalty::setDefaultRoyaltyInfoCall {
        royaltyRecipient: recipient,
        royaltyBps: bps,
    }
    .abi_encode()
    .into()
}

/// Core `mint(to, quantity, encodedArgs)`; `encoded_args` is forwarded to the before-mint hook.
pub fn mint_call(to: Address, quantity: U256, encoded_args: Bytes) -> Bytes {
    IHookedCore::mintCall {
        to,
        quantity,
        encodedArgs: encoded_args,
    }
    .abi_encode()
    .into()
}
