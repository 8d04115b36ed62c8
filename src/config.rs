//! Configuration file parsing for the hook router.
//!
//! This module handles loading and parsing the `hooks.toml` file: the RPC endpoint,
//! receipt timing, the core contract and its directory layout, and the hooks the
//! caller intends to install or route to.
//!
//! Configuration is an explicit value handed to constructors. Missing sections fall
//! back to defaults.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::directory::{DirectoryLayout, HookFlag};
use crate::negotiator::DEFAULT_SIGNATURE_FUNCTION;

/// Complete hook router configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HookRouterConfig {
    pub network: NetworkConfig,
    pub transaction: TransactionConfig,
    pub core: CoreConfig,
    /// Hook entries by name.
    pub hooks: BTreeMap<String, HookEntry>,
}

impl HookRouterConfig {
    /// Load configuration from a TOML file.
    ///
    /// If the file doesn't exist, returns the default configuration.
    /// If the file exists but is malformed, returns an error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Load configuration from environment variable CONFIG_FILE or default path.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let config_path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "hooks.toml".to_string());
        Self::from_file(config_path)
    }

    /// Look up a configured hook by name.
    pub fn hook(&self, name: &str) -> Option<&HookEntry> {
        self.hooks.get(name)
    }

    /// First configured hook for `flag`.
    pub fn hook_for_flag(&self, flag: HookFlag) -> Option<&HookEntry> {
        self.hooks.values().find(|entry| entry.flag == flag)
    }
}

/// RPC endpoint and signer selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint.
    pub rpc_url: String,
    /// Numeric chain id used for EIP-155 signing.
    pub chain_id: u64,
    /// Name of the environment variable holding the signer's private key.
    pub private_key_env: String,
    /// Timeout for individual RPC requests in seconds.
    pub rpc_timeout_seconds: u64,
}

impl NetworkConfig {
    /// Get the RPC request timeout duration.
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_seconds)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            chain_id: 5,
            private_key_env: "TEST_WALLET_PRIVATE_KEY".to_string(),
            rpc_timeout_seconds: 30,
        }
    }
}

/// Receipt polling and confirmation bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Average block time for this chain in seconds.
    pub block_time_seconds: u64,
    /// Number of blocks to wait for a receipt before giving up.
    /// Receipt timeout = block_time_seconds * receipt_timeout_blocks.
    pub receipt_timeout_blocks: u64,
    /// Delay between receipt polls in milliseconds.
    pub poll_interval_millis: u64,
}

impl TransactionConfig {
    /// Get the total receipt timeout duration.
    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.block_time_seconds * self.receipt_timeout_blocks)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_millis)
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            block_time_seconds: 12,
            receipt_timeout_blocks: 10, // 2 minutes
            poll_interval_millis: 1_000,
        }
    }
}

/// The core contract routed calls are sent to.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Core contract address.
    pub address: Address,
    /// Flags in the positional order of the `getAllHooks()` return struct.
    pub layout: DirectoryLayout,
    /// Refuse to submit a routed write when the directory shows no hook at its flag.
    pub preflight_directory_check: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            address: Address::ZERO,
            layout: DirectoryLayout::default(),
            preflight_directory_check: true,
        }
    }
}

/// One hook the caller works with.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HookEntry {
    /// Category the hook is installed under.
    pub flag: HookFlag,
    /// Deployed hook contract.
    pub address: Address,
    /// Zero-argument function returning the hook's argument signature.
    #[serde(default = "default_signature_function")]
    pub signature_function: String,
}

fn default_signature_function() -> String {
    DEFAULT_SIGNATURE_FUNCTION.to_string()
}
