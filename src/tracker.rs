//! Transaction confirmation tracking.
//!
//! Submission and confirmation are one blocking step from the caller's point of view:
//! submit, then wait for a terminal receipt within a bound. No local retries; a revert
//! is terminal and reported upward with its reason.

use alloy::primitives::{B256, TxHash};
use serde::Serialize;
use std::time::Duration;
use tracing::instrument;

use crate::config::TransactionConfig;
use crate::errors::{ProtocolError, ProtocolResult};
use crate::transport::{PreparedCall, SubmissionHandle, Transport};

/// Result of a confirmed transaction. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionOutcome {
    pub tx_hash: TxHash,
    /// Always `true`: failed receipts surface as [`ProtocolError::Reverted`] instead.
    pub success: bool,
    pub block_number: Option<u64>,
    pub block_hash: Option<B256>,
}

/// Waits for receipts with an upper bound.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationTracker {
    timeout: Duration,
}

impl ConfirmationTracker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_config(config: &TransactionConfig) -> Self {
        Self::new(config.receipt_timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Submit `call` and wait for its receipt.
    pub async fn submit_and_wait<T: Transport + ?Sized>(
        &self,
        transport: &T,
        call: PreparedCall,
    ) -> ProtocolResult<TransactionOutcome> {
        let handle = transport.submit(call).await?;
        self.wait(transport, &handle).await
    }

    /// Wait for an already submitted transaction.
    ///
    /// # Errors
    /// - [`ProtocolError::Timeout`] if no receipt arrives within the bound.
    /// - [`ProtocolError::Reverted`] if the receipt reports failure.
    #[instrument(skip_all, fields(tx = %handle.tx_hash))]
    pub async fn wait<T: Transport + ?Sized>(
        &self,
        transport: &T,
        handle: &SubmissionHandle,
    ) -> ProtocolResult<TransactionOutcome> {
        let receipt = match tokio::time::timeout(self.timeout, transport.wait_for_receipt(handle)).await {
            Ok(receipt) => receipt?,
            Err(_) => {
                tracing::error!(timeout_secs = self.timeout.as_secs_f64(), "Confirmation timed out");
                return Err(ProtocolError::Timeout(self.timeout));
            }
        };

        if !receipt.success {
            let reason = receipt
                .revert_reason
                .unwrap_or_else(|| "transaction reverted".to_string());
            tracing::warn!(%reason, "Transaction reverted");
            return Err(ProtocolError::Reverted(reason));
        }

        tracing::info!(block = ?receipt.block_number, "Transaction confirmed");
        Ok(TransactionOutcome {
            tx_hash: receipt.tx_hash,
            success: true,
            block_number: receipt.block_number,
            block_hash: receipt.block_hash,
        })
    }
}

impl Default for ConfirmationTracker {
    fn default() -> Self {
        Self::from_config(&TransactionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCore;
    use alloy::primitives::address;

    fn call() -> PreparedCall {
        PreparedCall::new(address!("0x1111111111111111111111111111111111111111"), vec![0x01])
    }

    #[tokio::test]
    async fn test_confirmed_outcome() {
        let core = MockCore::new();
        let tracker = ConfirmationTracker::new(Duration::from_secs(5));

        let outcome = tracker.submit_and_wait(&core, call()).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.block_number, Some(1));
        assert_eq!(core.submission_count(), 1);
    }

    #[tokio::test]
    async fn test_reverted_receipt_reports_reason() {
        let core = MockCore::new();
        core.revert_on_receipt("!Allowlisted");
        let tracker = ConfirmationTracker::new(Duration::from_secs(5));

        let err = tracker.submit_and_wait(&core, call()).await.unwrap_err();
        assert_eq!(err, ProtocolError::Reverted("!Allowlisted".to_string()));
    }

    #[tokio::test]
    async fn test_rejected_submission_is_reverted() {
        let core = MockCore::new();
        core.reject_submissions("Ownable: caller is not the owner");
        let tracker = ConfirmationTracker::new(Duration::from_secs(5));

        let err = tracker.submit_and_wait(&core, call()).await.unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Reverted("Ownable: caller is not the owner".to_string())
        );
        assert_eq!(core.submission_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_when_receipt_never_arrives() {
        let core = MockCore::new();
        core.stall_receipts();
        let tracker = ConfirmationTracker::new(Duration::from_secs(30));

        let err = tracker.submit_and_wait(&core, call()).await.unwrap_err();
        assert_eq!(err, ProtocolError::Timeout(Duration::from_secs(30)));
    }
}
