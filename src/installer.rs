//! Idempotent hook installation.
//!
//! The directory is re-read before every decision. When the flag already maps to the
//! requested hook nothing is submitted. Concurrent installers racing on the same
//! flag may both submit; the last confirmed install wins.
//!
//! The core fills the slots a hook reports through `getHooks()`, so a hook is only
//! installed for a flag its bitmask includes, and the directory is read again after
//! confirmation to check the flag now routes to it.

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use serde::Serialize;
use tracing::instrument;

use crate::abi::{self, DynSolValue, EncodingSpec, TypeTag};
use crate::contracts::{IHook, IHookedCore};
use crate::directory::{DirectoryLayout, HookFlag, HookLookup, fetch_directory};
use crate::errors::{ProtocolError, ProtocolResult};
use crate::tracker::{ConfirmationTracker, TransactionOutcome};
use crate::transport::{PreparedCall, Transport};

/// What an install or uninstall request did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum InstallOutcome {
    /// A transaction was submitted and confirmed.
    Submitted(TransactionOutcome),
    /// The directory already matched; zero transactions submitted.
    NoOp,
}

impl InstallOutcome {
    pub fn is_noop(&self) -> bool {
        matches!(self, InstallOutcome::NoOp)
    }
}

/// Make sure `flag` on `core` routes to `hook`.
///
/// A different hook already at `flag` is replaced; whether that is allowed is up to
/// the core contract.
///
/// # Errors
/// - [`ProtocolError::UnknownFlag`] if `flag` is not in `layout`.
/// - [`ProtocolError::FlagNotImplemented`] if `hook` does not report `flag`; nothing is submitted.
/// - [`ProtocolError::InstallNotApplied`] if the confirmed install left `flag` routed elsewhere.
/// - Directory, revert and timeout errors from the underlying steps.
#[instrument(skip_all, fields(core = %core, flag = %flag, hook = %hook))]
pub async fn ensure_installed<T: Transport + ?Sized>(
    transport: &T,
    tracker: &ConfirmationTracker,
    core: Address,
    layout: &DirectoryLayout,
    flag: HookFlag,
    hook: Address,
) -> ProtocolResult<InstallOutcome> {
    let directory = fetch_directory(transport, core, layout).await?;

    match directory.lookup(flag) {
        HookLookup::Installed(current) if current == hook => {
            tracing::info!("Hook already installed, skipping");
            return Ok(InstallOutcome::NoOp);
        }
        HookLookup::Installed(current) => {
            tracing::warn!(%current, "Replacing installed hook");
        }
        HookLookup::Absent => {
            tracing::info!("Installing hook");
        }
        HookLookup::Unknown => return Err(ProtocolError::UnknownFlag(flag)),
    }

    let implemented = implemented_flags(transport, hook).await?;
    if (implemented & U256::from(flag.bits())).is_zero() {
        tracing::warn!(%implemented, "Hook does not implement flag");
        return Err(ProtocolError::FlagNotImplemented { hook, flag });
    }

    let calldata = IHookedCore::installHookCall { hook }.abi_encode();
    let outcome = tracker
        .submit_and_wait(transport, PreparedCall::new(core, calldata))
        .await?;

    let directory = fetch_directory(transport, core, layout).await?;
    if directory.lookup(flag) != HookLookup::Installed(hook) {
        tracing::error!(tx = %outcome.tx_hash, "Install confirmed but directory unchanged");
        return Err(ProtocolError::InstallNotApplied { hook, flag });
    }
    tracing::info!(tx = %outcome.tx_hash, "Installed hook");
    Ok(InstallOutcome::Submitted(outcome))
}

/// Bitmask of the flags `hook` reports through `getHooks()`.
pub async fn implemented_flags<T: Transport + ?Sized>(transport: &T, hook: Address) -> ProtocolResult<U256> {
    let raw = transport
        .call(hook, IHook::getHooksCall {}.abi_encode().into())
        .await?;
    match abi::decode(&EncodingSpec::new(vec![TypeTag::Uint(256)]), &raw)?.pop() {
        Some(DynSolValue::Uint(bits, _)) => Ok(bits),
        other => Err(ProtocolError::EncodingMismatch(format!(
            "getHooks returned {other:?}, expected uint256"
        ))),
    }
}

/// Make sure `hook` occupies no slot on `core`.
#[instrument(skip_all, fields(core = %core, hook = %hook))]
pub async fn ensure_uninstalled<T: Transport + ?Sized>(
    transport: &T,
    tracker: &ConfirmationTracker,
    core: Address,
    layout: &DirectoryLayout,
    hook: Address,
) -> ProtocolResult<InstallOutcome> {
    let directory = fetch_directory(transport, core, layout).await?;
    let flags = directory.flags_of(hook);
    if flags.is_empty() {
        tracing::info!("Hook not installed, nothing to uninstall");
        return Ok(InstallOutcome::NoOp);
    }

    tracing::info!(?flags, "Uninstalling hook");
    let calldata = IHookedCore::uninstallHookCall { hook }.abi_encode();
    let outcome = tracker
        .submit_and_wait(transport, PreparedCall::new(core, calldata))
        .await?;
    Ok(InstallOutcome::Submitted(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCore;
    use alloy::primitives::address;
    use std::time::Duration;

    const HOOK: Address = address!("0x9Ef026c82F6491eBA4EAC14378a3FEd397C9F282");
    const OTHER_HOOK: Address = address!("0x3333333333333333333333333333333333333333");

    fn tracker() -> ConfirmationTracker {
        ConfirmationTracker::new(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_install_when_absent_then_noop() {
        let core = MockCore::new();
        core.register_hook(HOOK, &[HookFlag::BEFORE_MINT], "bytes32[]");
        let layout = DirectoryLayout::erc721();

        let first = ensure_installed(&core, &tracker(), MockCore::ADDRESS, &layout, HookFlag::BEFORE_MINT, HOOK)
            .await
            .unwrap();
        assert!(matches!(first, InstallOutcome::Submitted(_)));

        let second = ensure_installed(&core, &tracker(), MockCore::ADDRESS, &layout, HookFlag::BEFORE_MINT, HOOK)
            .await
            .unwrap();
        assert!(second.is_noop());

        assert_eq!(core.submission_count(), 1);
        let directory = fetch_directory(&core, MockCore::ADDRESS, &layout).await.unwrap();
        assert_eq!(directory.get(HookFlag::BEFORE_MINT), Some(HOOK));
    }

    #[tokio::test]
    async fn test_install_replaces_different_hook() {
        let core = MockCore::new();
        core.register_hook(HOOK, &[HookFlag::BEFORE_MINT], "bytes32[]");
        core.preinstall(HookFlag::BEFORE_MINT, OTHER_HOOK);
        let layout = DirectoryLayout::erc721();

        let outcome = ensure_installed(&core, &tracker(), MockCore::ADDRESS, &layout, HookFlag::BEFORE_MINT, HOOK)
            .await
            .unwrap();
        assert!(!outcome.is_noop());

        let directory = fetch_directory(&core, MockCore::ADDRESS, &layout).await.unwrap();
        assert_eq!(directory.get(HookFlag::BEFORE_MINT), Some(HOOK));
    }

    #[tokio::test]
    async fn test_install_unknown_flag_submits_nothing() {
        let core = MockCore::new();

        let err = ensure_installed(
            &core,
            &tracker(),
            MockCore::ADDRESS,
            &DirectoryLayout::erc721(),
            HookFlag::new(1 << 9).unwrap(),
            HOOK,
        )
        .await
        .unwrap_err();
        assert_eq!(err, ProtocolError::UnknownFlag(HookFlag::new(1 << 9).unwrap()));
        assert_eq!(core.submission_count(), 0);
    }

    #[tokio::test]
    async fn test_install_directory_unavailable_aborts() {
        let core = MockCore::new();
        core.fail_reads("connection reset");

        let err = ensure_installed(
            &core,
            &tracker(),
            MockCore::ADDRESS,
            &DirectoryLayout::erc721(),
            HookFlag::BEFORE_MINT,
            HOOK,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ProtocolError::DirectoryUnavailable(_)));
        assert_eq!(core.submission_count(), 0);
    }

    #[tokio::test]
    async fn test_install_revert_propagates() {
        let core = MockCore::new();
        core.register_hook(HOOK, &[HookFlag::BEFORE_MINT], "bytes32[]");
        core.revert_on_receipt("Ownable: caller is not the owner");

        let err = ensure_installed(
            &core,
            &tracker(),
            MockCore::ADDRESS,
            &DirectoryLayout::erc721(),
            HookFlag::BEFORE_MINT,
            HOOK,
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Reverted("Ownable: caller is not the owner".to_string())
        );
    }

    #[tokio::test]
    async fn test_install_refuses_hook_without_flag() {
        let core = MockCore::new();
        core.register_hook(HOOK, &[HookFlag::TOKEN_URI], "");
        let layout = DirectoryLayout::erc721();

        for _ in 0..2 {
            let err = ensure_installed(&core, &tracker(), MockCore::ADDRESS, &layout, HookFlag::BEFORE_MINT, HOOK)
                .await
                .unwrap_err();
            assert_eq!(
                err,
                ProtocolError::FlagNotImplemented {
                    hook: HOOK,
                    flag: HookFlag::BEFORE_MINT
                }
            );
        }
        assert_eq!(core.submission_count(), 0);

        let directory = fetch_directory(&core, MockCore::ADDRESS, &layout).await.unwrap();
        assert_eq!(directory.lookup(HookFlag::BEFORE_MINT), HookLookup::Absent);
    }

    #[tokio::test]
    async fn test_install_checks_directory_after_confirmation() {
        let core = MockCore::new();
        core.register_hook(HOOK, &[HookFlag::BEFORE_MINT], "bytes32[]");
        core.ignore_installs();

        let err = ensure_installed(
            &core,
            &tracker(),
            MockCore::ADDRESS,
            &DirectoryLayout::erc721(),
            HookFlag::BEFORE_MINT,
            HOOK,
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InstallNotApplied {
                hook: HOOK,
                flag: HookFlag::BEFORE_MINT
            }
        );
        assert_eq!(core.submission_count(), 1);
    }

    #[tokio::test]
    async fn test_implemented_flags_reads_bitmask() {
        let core = MockCore::new();
        core.register_hook(HOOK, &[HookFlag::BEFORE_MINT, HookFlag::ROYALTY_INFO], "");

        let bits = implemented_flags(&core, HOOK).await.unwrap();
        assert_eq!(bits, U256::from(0b100_0010u64));
    }

    #[tokio::test]
    async fn test_uninstall_is_idempotent() {
        let core = MockCore::new();
        core.preinstall(HookFlag::TOKEN_URI, HOOK);
        let layout = DirectoryLayout::erc721();

        let first = ensure_uninstalled(&core, &tracker(), MockCore::ADDRESS, &layout, HOOK)
            .await
            .unwrap();
        assert!(!first.is_noop());
        let second = ensure_uninstalled(&core, &tracker(), MockCore::ADDRESS, &layout, HOOK)
            .await
            .unwrap();
        assert!(second.is_noop());
        assert_eq!(core.submission_count(), 1);

        let directory = fetch_directory(&core, MockCore::ADDRESS, &layout).await.unwrap();
        assert_eq!(directory.lookup(HookFlag::TOKEN_URI), crate::directory::HookLookup::Absent);
    }
}
