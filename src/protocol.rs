//! One entry point per protocol operation.
//!
//! [`HookProtocol`] binds a transport to one core contract and runs each step
//! sequentially: every step's input depends on the previous step's output, and any
//! failure aborts the rest of the operation.

use alloy::primitives::{Address, Bytes, U256};
use tracing::instrument;

use crate::abi::EncodingSpec;
use crate::config::{HookEntry, HookRouterConfig};
use crate::directory::{DirectoryLayout, HookDirectory, HookFlag, HookLookup, fetch_directory};
use crate::dispatcher::{self, build_envelope};
use crate::errors::{ProtocolError, ProtocolResult};
use crate::installer::{self, InstallOutcome};
use crate::negotiator;
use crate::tracker::{ConfirmationTracker, TransactionOutcome};
use crate::transport::{PreparedCall, Transport};

/// Result of [`HookProtocol::mint_with_hook`].
#[derive(Debug, Clone)]
pub struct MintReport {
    pub install: InstallOutcome,
    /// Argument shape the hook published.
    pub spec: EncodingSpec,
    /// Arguments forwarded to the hook.
    pub encoded_args: Bytes,
    pub outcome: TransactionOutcome,
}

/// Hook routing client for one core contract.
pub struct HookProtocol<T> {
    transport: T,
    core: Address,
    layout: DirectoryLayout,
    tracker: ConfirmationTracker,
    preflight: bool,
}

impl<T: Transport> HookProtocol<T> {
    pub fn new(transport: T, core: Address) -> Self {
        Self {
            transport,
            core,
            layout: DirectoryLayout::default(),
            tracker: ConfirmationTracker::default(),
            preflight: true,
        }
    }

    pub fn from_config(transport: T, config: &HookRouterConfig) -> Self {
        Self {
            transport,
            core: config.core.address,
            layout: config.core.layout.clone(),
            tracker: ConfirmationTracker::from_config(&config.transaction),
            preflight: config.core.preflight_directory_check,
        }
    }

    pub fn with_layout(mut self, layout: DirectoryLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_tracker(mut self, tracker: ConfirmationTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Check the directory before routed writes. Enabled by default.
    pub fn with_preflight(mut self, preflight: bool) -> Self {
        self.preflight = preflight;
        self
    }

    pub fn core(&self) -> Address {
        self.core
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fresh snapshot of the core's hook directory.
    pub async fn fetch_directory(&self) -> ProtocolResult<HookDirectory> {
        fetch_directory(&self.transport, self.core, &self.layout).await
    }

    pub async fn ensure_hook_installed(&self, flag: HookFlag, hook: Address) -> ProtocolResult<InstallOutcome> {
        installer::ensure_installed(&self.transport, &self.tracker, self.core, &self.layout, flag, hook).await
    }

    pub async fn ensure_hook_uninstalled(&self, hook: Address) -> ProtocolResult<InstallOutcome> {
        installer::ensure_uninstalled(&self.transport, &self.tracker, self.core, &self.layout, hook).await
    }

    /// Argument spec published by `hook` through `signature_function`.
    pub async fn negotiate_args(&self, hook: Address, signature_function: &str) -> ProtocolResult<EncodingSpec> {
        negotiator::negotiate(&self.transport, hook, signature_function).await
    }

    /// Route `payload` to the hook at `flag` and wait for confirmation.
    ///
    /// # Errors
    /// With preflight enabled, [`ProtocolError::HookNotInstalled`] or
    /// [`ProtocolError::UnknownFlag`] before anything is submitted.
    #[instrument(skip_all, fields(core = %self.core, flag = %flag))]
    pub async fn dispatch_routed_call(
        &self,
        flag: HookFlag,
        value: U256,
        payload: Bytes,
    ) -> ProtocolResult<TransactionOutcome> {
        if self.preflight {
            self.require_installed(flag).await?;
        }
        let envelope = build_envelope(flag, value, payload);
        let handle = dispatcher::dispatch(&self.transport, self.core, &envelope).await?;
        self.tracker.wait(&self.transport, &handle).await
    }

    /// Route a read-only call to the hook at `flag` and return its raw return data.
    pub async fn read_routed_call(&self, flag: HookFlag, payload: Bytes) -> ProtocolResult<Bytes> {
        let envelope = build_envelope(flag, U256::ZERO, payload);
        dispatcher::dispatch_read(&self.transport, self.core, &envelope).await
    }

    /// `setDefaultRoyaltyInfo(recipient, bps)` through the royalty hook.
    pub async fn set_default_royalty_info(&self, recipient: Address, bps: U256) -> ProtocolResult<TransactionOutcome> {
        let payload = dispatcher::set_default_royalty_info_call(recipient, bps);
        self.dispatch_routed_call(HookFlag::ROYALTY_INFO, U256::ZERO, payload).await
    }

    /// `lazyMint(amount, baseURI, "")` through the token URI hook.
    pub async fn lazy_mint(&self, amount: U256, base_uri: &str) -> ProtocolResult<TransactionOutcome> {
        let payload = dispatcher::lazy_mint_call(amount, base_uri, Bytes::new());
        self.dispatch_routed_call(HookFlag::TOKEN_URI, U256::ZERO, payload).await
    }

    /// Install `hook` if needed, negotiate its arguments, encode `args` against them
    /// and mint `quantity` tokens to `to`.
    ///
    /// Arguments are encoded before the mint is built, so a shape mismatch or an
    /// unsupported tag never reaches the network.
    #[instrument(skip_all, fields(core = %self.core, hook = %hook.address, to = %to))]
    pub async fn mint_with_hook(
        &self,
        hook: &HookEntry,
        to: Address,
        quantity: U256,
        args: &[serde_json::Value],
    ) -> ProtocolResult<MintReport> {
        let install = self.ensure_hook_installed(hook.flag, hook.address).await?;
        let spec = self.negotiate_args(hook.address, &hook.signature_function).await?;
        let encoded_args = negotiator::encode_json_args(&spec, args)?;

        let calldata = dispatcher::mint_call(to, quantity, encoded_args.clone());
        tracing::info!(%spec, args_len = encoded_args.len(), "Minting");
        let outcome = self
            .tracker
            .submit_and_wait(&self.transport, PreparedCall::new(self.core, calldata))
            .await?;

        Ok(MintReport {
            install,
            spec,
            encoded_args,
            outcome,
        })
    }

    async fn require_installed(&self, flag: HookFlag) -> ProtocolResult<Address> {
        match self.fetch_directory().await?.lookup(flag) {
            HookLookup::Installed(hook) => Ok(hook),
            HookLookup::Absent => {
                tracing::warn!("No hook installed for routed call");
                Err(ProtocolError::HookNotInstalled(flag))
            }
            HookLookup::Unknown => Err(ProtocolError::UnknownFlag(flag)),
        }
    }
}
