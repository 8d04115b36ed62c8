//! Signing/transport collaborator.
//!
//! The protocol components only need three operations from the network: a read
//! `call`, a signed `submit`, and `wait_for_receipt`. How keys are held or which
//! chain is selected stays behind this trait.

use alloy::primitives::{Address, B256, Bytes, TxHash, U256};
use async_trait::async_trait;
use thiserror::Error;

pub mod evm;

pub use evm::EvmTransport;

/// Errors reported by a [`Transport`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// RPC request failed (connection, timeout at the HTTP layer, malformed response).
    #[error("RPC error: {0}")]
    Rpc(String),
    /// Execution reverted during simulation or estimation.
    #[error("execution reverted: {0}")]
    Reverted(String),
    /// The signer could not produce a transaction.
    #[error("signer error: {0}")]
    Signer(String),
}

/// A state-changing call ready to be signed and submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCall {
    /// Target contract address.
    pub to: Address,
    /// Encoded function call.
    pub calldata: Bytes,
    /// Native currency forwarded with the call.
    pub value: U256,
}

impl PreparedCall {
    pub fn new(to: Address, calldata: impl Into<Bytes>) -> Self {
        Self {
            to,
            calldata: calldata.into(),
            value: U256::ZERO,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// Handle to a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionHandle {
    pub tx_hash: TxHash,
    /// The call that was submitted, kept so a failed receipt can be replayed for its reason.
    pub call: PreparedCall,
}

/// Terminal receipt as reported by the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub success: bool,
    pub block_number: Option<u64>,
    pub block_hash: Option<B256>,
    /// Decoded revert reason, when the transport could recover one.
    pub revert_reason: Option<String>,
}

/// Network operations the protocol depends on.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Read-only call; returns the raw return data.
    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, TransportError>;

    /// Sign and broadcast a state-changing call.
    async fn submit(&self, call: PreparedCall) -> Result<SubmissionHandle, TransportError>;

    /// Resolve once the submitted transaction has a receipt. May wait indefinitely;
    /// callers bound it with their own timeout.
    async fn wait_for_receipt(&self, handle: &SubmissionHandle) -> Result<Receipt, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, TransportError> {
        (**self).call(to, calldata).await
    }

    async fn submit(&self, call: PreparedCall) -> Result<SubmissionHandle, TransportError> {
        (**self).submit(call).await
    }

    async fn wait_for_receipt(&self, handle: &SubmissionHandle) -> Result<Receipt, TransportError> {
        (**self).wait_for_receipt(handle).await
    }
}
