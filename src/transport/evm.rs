//! Alloy-backed transport: JSON-RPC over HTTP with a local signing wallet.
//!
//! - **call**: `eth_call` from the signer address against latest state.
//! - **submit**: fills gas, nonce and chain id, signs with the wallet and broadcasts.
//! - **wait_for_receipt**: polls `eth_getTransactionReceipt` until the network reports one.
//!   A failed receipt is replayed as an `eth_call` against the parent block to recover
//!   the revert reason.
//!
//! Retries and backoff are not done here; a failed request is reported to the caller.

use alloy::hex;
use alloy::network::{Ethereum, EthereumWallet, NetworkWallet, ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, Bytes};
use alloy::providers::fillers::{
    BlobGasFiller, CachedNonceManager, ChainIdFiller, GasFiller, JoinFill, NonceFiller,
};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::{BlockId, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::{Revert, SolError, decode_revert_reason};
use alloy::transports::{RpcError, TransportErrorKind};
use async_trait::async_trait;
use std::str::FromStr;
use std::time::Duration;
use tracing::{Instrument, instrument};

use super::{PreparedCall, Receipt, SubmissionHandle, Transport, TransportError};
use crate::abi::{self, DynSolValue, EncodingSpec, TypeTag};
use crate::config::{HookRouterConfig, NetworkConfig};

/// [`Transport`] over an alloy provider with wallet, gas, nonce and chain-id fillers.
pub struct EvmTransport {
    provider: DynProvider,
    signer: Address,
    poll_interval: Duration,
}

impl EvmTransport {
    /// Build a transport for `network` that signs with `wallet`.
    pub fn try_new(
        wallet: EthereumWallet,
        network: &NetworkConfig,
        poll_interval: Duration,
    ) -> Result<Self, TransportError> {
        let url = network.rpc_url.parse::<url::Url>().map_err(|e| {
            tracing::error!("Invalid RPC URL {}: {e:?}", network.rpc_url);
            TransportError::Rpc(format!("Invalid RPC URL: {}", network.rpc_url))
        })?;

        let rpc_timeout = network.rpc_timeout();
        tracing::debug!(
            chain_id = network.chain_id,
            rpc_timeout_secs = rpc_timeout.as_secs(),
            "Configuring RPC client with timeout"
        );

        let http_client = alloy::transports::http::reqwest::Client::builder()
            .timeout(rpc_timeout)
            .build()
            .map_err(|e| TransportError::Rpc(format!("HTTP client initialization failed: {e}")))?;
        let client = RpcClient::builder().http_with_client(http_client, url);

        let signer = NetworkWallet::<Ethereum>::default_signer_address(&wallet);

        // Gas -> BlobGas -> Nonce -> ChainId
        let filler = JoinFill::new(
            GasFiller,
            JoinFill::new(
                BlobGasFiller::default(),
                JoinFill::new(
                    NonceFiller::new(CachedNonceManager::default()),
                    ChainIdFiller::new(Some(network.chain_id)),
                ),
            ),
        );

        let provider = ProviderBuilder::default()
            .filler(filler)
            .wallet(wallet)
            .connect_client(client)
            .erased();

        tracing::info!(chain_id = network.chain_id, rpc = %network.rpc_url, %signer, "Initialized transport");

        Ok(Self {
            provider,
            signer,
            poll_interval,
        })
    }

    /// Build a transport from configuration, reading the private key from the
    /// environment variable the configuration names.
    pub fn from_config(config: &HookRouterConfig) -> Result<Self, TransportError> {
        let key_var = &config.network.private_key_env;
        let key = std::env::var(key_var)
            .map_err(|_| TransportError::Signer(format!("environment variable {key_var} is not set")))?;
        let signer = PrivateKeySigner::from_str(key.trim())
            .map_err(|e| TransportError::Signer(format!("invalid private key in {key_var}: {e}")))?;
        Self::try_new(
            EthereumWallet::from(signer),
            &config.network,
            config.transaction.poll_interval(),
        )
    }

    /// Address transactions are sent from.
    pub fn signer_address(&self) -> Address {
        self.signer
    }

    fn request(&self, to: Address, calldata: Bytes) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(self.signer)
            .with_to(to)
            .with_input(calldata)
    }

    /// Re-run a failed call against the state it executed on to recover the revert reason.
    async fn replay_revert_reason(&self, handle: &SubmissionHandle, block: Option<u64>) -> Option<String> {
        let tx = self
            .request(handle.call.to, handle.call.calldata.clone())
            .with_value(handle.call.value);
        let at = BlockId::number(block?.saturating_sub(1));
        match self.provider.call(tx).block(at).await {
            Ok(_) => None,
            Err(e) => revert_reason(&e),
        }
    }
}

#[async_trait]
impl Transport for EvmTransport {
    #[instrument(skip_all, fields(to = %to))]
    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, TransportError> {
        self.provider
            .call(self.request(to, calldata))
            .await
            .map_err(|e| categorize_transport_error(e, "eth_call"))
    }

    async fn submit(&self, call: PreparedCall) -> Result<SubmissionHandle, TransportError> {
        let txr = self
            .request(call.to, call.calldata.clone())
            .with_value(call.value);

        let pending = self
            .provider
            .send_transaction(txr)
            .instrument(tracing::info_span!("send_transaction", to = %call.to))
            .await
            .map_err(|e| categorize_transport_error(e, "send_transaction"))?;

        let tx_hash = *pending.tx_hash();
        tracing::info!(tx = %tx_hash, to = %call.to, "Transaction submitted");
        Ok(SubmissionHandle { tx_hash, call })
    }

    #[instrument(skip_all, fields(tx = %handle.tx_hash))]
    async fn wait_for_receipt(&self, handle: &SubmissionHandle) -> Result<Receipt, TransportError> {
        loop {
            let receipt = self
                .provider
                .get_transaction_receipt(handle.tx_hash)
                .await
                .map_err(|e| categorize_transport_error(e, "eth_getTransactionReceipt"))?;

            let Some(receipt) = receipt else {
                tracing::trace!("Receipt not yet available");
                tokio::time::sleep(self.poll_interval).await;
                continue;
            };

            let success = ReceiptResponse::status(&receipt);
            let block_number = ReceiptResponse::block_number(&receipt);
            let revert_reason = if success {
                None
            } else {
                self.replay_revert_reason(handle, block_number).await
            };

            return Ok(Receipt {
                tx_hash: ReceiptResponse::transaction_hash(&receipt),
                success,
                block_number,
                block_hash: ReceiptResponse::block_hash(&receipt),
                revert_reason,
            });
        }
    }
}

/// Extract a human-readable revert reason from a JSON-RPC error, if it carries one.
fn revert_reason(err: &RpcError<TransportErrorKind>) -> Option<String> {
    let payload = err.as_error_resp()?;
    if let Some(data) = payload.as_revert_data() {
        return Some(decode_reason(&data));
    }
    payload
        .message
        .contains("revert")
        .then(|| payload.message.to_string())
}

/// `Error(string)` payloads yield the bare message; other payloads fall back to alloy's
/// decoder, then to hex.
fn decode_reason(data: &[u8]) -> String {
    if let Some((selector, params)) = data.split_first_chunk::<4>() {
        if *selector == Revert::SELECTOR {
            let spec = EncodingSpec::new(vec![TypeTag::String]);
            if let Ok(mut values) = abi::decode(&spec, params) {
                if let Some(DynSolValue::String(reason)) = values.pop() {
                    return reason;
                }
            }
        }
    }
    decode_revert_reason(data).unwrap_or_else(|| format!("0x{}", hex::encode(data)))
}

/// Split RPC failures into reverts (reported verbatim) and transport errors.
fn categorize_transport_error(e: RpcError<TransportErrorKind>, context: &str) -> TransportError {
    if let Some(reason) = revert_reason(&e) {
        tracing::warn!("{context}: execution reverted: {reason}");
        return TransportError::Reverted(reason);
    }
    let err_str = format!("{e:?}");
    if err_str.contains("Connection refused")
        || err_str.contains("Connection reset")
        || err_str.contains("timeout")
        || err_str.contains("dns error")
    {
        tracing::error!("{context}: RPC connection error: {err_str}");
        TransportError::Rpc(format!("{context}: connection error"))
    } else {
        tracing::error!("{context}: RPC request failed: {err_str}");
        TransportError::Rpc(format!("{context}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::rpc::json_rpc::ErrorPayload;

    fn error_resp(message: &str, data: Option<&str>) -> RpcError<TransportErrorKind> {
        let payload: ErrorPayload = serde_json::from_value(serde_json::json!({
            "code": 3,
            "message": message,
            "data": data,
        }))
        .unwrap();
        RpcError::ErrorResp(payload)
    }

    #[test]
    fn test_revert_reason_decodes_error_string() {
        let data = format!("0x{}", hex::encode(Revert {
            reason: "!Allowlisted".to_string(),
        }
        .abi_encode()));
        let err = error_resp("execution reverted", Some(&data));
        assert_eq!(revert_reason(&err).as_deref(), Some("!Allowlisted"));
        assert_eq!(
            categorize_transport_error(err, "test"),
            TransportError::Reverted("!Allowlisted".to_string())
        );
    }

    #[test]
    fn test_decode_reason_falls_back_to_hex() {
        assert_eq!(decode_reason(&[0xde, 0xad, 0xbe, 0xef]), "0xdeadbeef");
    }

    #[test]
    fn test_non_revert_is_rpc_error() {
        let err = error_resp("insufficient funds for gas", None);
        assert_eq!(revert_reason(&err), None);
        assert!(matches!(categorize_transport_error(err, "test"), TransportError::Rpc(_)));
    }

    #[test]
    fn test_invalid_rpc_url_rejected() {
        let signer = PrivateKeySigner::from_str(
            "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )
        .unwrap();
        let network = NetworkConfig {
            rpc_url: "not a url".to_string(),
            ..NetworkConfig::default()
        };
        let result = EvmTransport::try_new(
            EthereumWallet::from(signer),
            &network,
            Duration::from_millis(10),
        );
        assert!(matches!(result, Err(TransportError::Rpc(_))));
    }
}
