//! Client for hook-routed core contracts.
//!
//! A core contract delegates lifecycle operations (mint-time validation, token
//! metadata, royalties) to pluggable hook contracts, each selected by a single-bit
//! flag. This crate discovers which hooks are installed, installs them idempotently,
//! negotiates each hook's argument encoding at runtime and routes calls through the
//! core's `hookFunctionWrite` / `hookFunctionRead` envelopes.
//!
//! [`HookProtocol`] exposes one entry point per operation; the building blocks are
//! public for callers composing their own flows.

pub mod abi;
pub mod config;
pub mod contracts;
pub mod directory;
pub mod dispatcher;
pub mod errors;
pub mod installer;
pub mod negotiator;
pub mod protocol;
pub mod telemetry;
pub mod tracker;
pub mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use config::HookRouterConfig;
pub use directory::{DirectoryLayout, HookDirectory, HookFlag, HookLookup};
pub use errors::{ProtocolError, ProtocolResult};
pub use installer::InstallOutcome;
pub use protocol::{HookProtocol, MintReport};
pub use tracker::{ConfirmationTracker, TransactionOutcome};
pub use transport::{EvmTransport, Transport, TransportError};
