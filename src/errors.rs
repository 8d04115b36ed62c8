//! Error types for the hook routing protocol

use alloy::primitives::Address;
use thiserror::Error;

use crate::directory::HookFlag;
use crate::transport::TransportError;

/// Errors that can abort a protocol step.
///
/// Every failure is terminal for the operation in progress; nothing is retried locally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Values disagree with an encoding spec in count, shape or range.
    /// Raised locally, nothing is sent over the wire.
    #[error("Encoding mismatch: {0}")]
    EncodingMismatch(String),

    /// A hook published a type tag this client cannot encode.
    #[error("Unknown type tag '{0}'")]
    UnknownTypeTag(String),

    /// The directory read against the core contract failed.
    #[error("Hook directory unavailable: {0}")]
    DirectoryUnavailable(String),

    /// The core or hook contract rejected the call. The reason is passed through verbatim.
    #[error("Reverted: {0}")]
    Reverted(String),

    /// No terminal receipt was observed within the confirmation bound.
    #[error("Timed out after {0:?} waiting for confirmation")]
    Timeout(std::time::Duration),

    /// A routed call targets a flag with no hook installed.
    #[error("No hook installed for flag {0}")]
    HookNotInstalled(HookFlag),

    /// The flag is not part of the directory layout of the core contract.
    #[error("Flag {0} is not known to the directory layout")]
    UnknownFlag(HookFlag),

    /// The hook's `getHooks()` bitmask does not include the flag it was asked to serve.
    #[error("Hook {hook} does not implement flag {flag}")]
    FlagNotImplemented { hook: Address, flag: HookFlag },

    /// An install confirmed but the directory does not route the flag to the hook.
    #[error("Install of {hook} confirmed but flag {flag} does not route to it")]
    InstallNotApplied { hook: Address, flag: HookFlag },

    /// Submission or RPC failure that is not a revert.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

impl From<TransportError> for ProtocolError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Reverted(reason) => ProtocolError::Reverted(reason),
            other => ProtocolError::Transport(other.to_string()),
        }
    }
}

impl From<alloy::dyn_abi::Error> for ProtocolError {
    fn from(err: alloy::dyn_abi::Error) -> Self {
        ProtocolError::EncodingMismatch(err.to_string())
    }
}

impl From<alloy::hex::FromHexError> for ProtocolError {
    fn from(err: alloy::hex::FromHexError) -> Self {
        ProtocolError::EncodingMismatch(format!("invalid hex: {err}"))
    }
}
