//! Hook router entrypoint.
//!
//! Mints through a hooked core contract: ensures the configured `beforeMint` hook is
//! installed, asks it for its argument signature, encodes the mint arguments against
//! it and submits `mint` to the signer's own address.
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `CONFIG_FILE` path of the TOML configuration (default `hooks.toml`)
//! - the variable named by `network.private_key_env` holds the signer key
//! - `MINT_QUANTITY` tokens to mint (default 1)
//! - `MINT_ARGS` JSON array of hook arguments (default `[[]]`, an empty allowlist proof)
//! - `RUST_LOG` log filter

use alloy::primitives::U256;
use dotenvy::dotenv;

use hook_router::{EvmTransport, HookFlag, HookProtocol, HookRouterConfig, telemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env variables
    dotenv().ok();

    telemetry::init();

    let config = match HookRouterConfig::from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let Some(hook) = config.hook_for_flag(HookFlag::BEFORE_MINT).cloned() else {
        tracing::error!("No beforeMint hook configured");
        std::process::exit(1);
    };

    let quantity = match parse_quantity(std::env::var("MINT_QUANTITY").ok().as_deref()) {
        Ok(quantity) => quantity,
        Err(e) => {
            tracing::error!("{}", e);
            std::process::exit(1);
        }
    };
    let args: Vec<serde_json::Value> = match std::env::var("MINT_ARGS") {
        Ok(raw) => serde_json::from_str(&raw)?,
        Err(_) => vec![serde_json::json!([])],
    };

    let transport = EvmTransport::from_config(&config)?;
    let recipient = transport.signer_address();
    let protocol = HookProtocol::from_config(transport, &config);

    let directory = protocol.fetch_directory().await?;
    tracing::info!(%directory, "Current hooks");

    let report = protocol
        .mint_with_hook(&hook, recipient, U256::from(quantity), &args)
        .await?;

    if report.install.is_noop() {
        tracing::info!(hook = %hook.address, "Hook was already installed");
    }
    tracing::info!(
        tx = %report.outcome.tx_hash,
        block = ?report.outcome.block_number,
        spec = %report.spec,
        "Mint confirmed"
    );
    println!("{}", serde_json::to_string_pretty(&report.outcome)?);

    Ok(())
}

/// Token count from `MINT_QUANTITY`; 1 when unset.
fn parse_quantity(raw: Option<&str>) -> Result<u64, String> {
    let Some(raw) = raw else {
        return Ok(1);
    };
    match raw.trim().parse::<u64>() {
        Ok(quantity) if quantity > 0 => Ok(quantity),
        _ => Err(format!("Invalid MINT_QUANTITY {raw:?}: expected a positive integer")),
    }
}
