// src/main.rs

//! # Tourist ID Issuer - Main Entry Point
//!
//! Loads configuration, builds the issuer key and ledger adapter, and either
//! serves the HTTP API or runs one administrative command.
//!
//! ## Commands
//! - `serve` (default): run the issue/verify API
//! - `address`: print the issuer address to register on the contract
//! - `set-trusted <address> [--untrust]`: flip the registry trust flag (owner only)

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use ethers::signers::LocalWallet;
use ethers_core::types::Address;
use ethers_core::utils::to_checksum;
use log::info;
use std::sync::Arc;
use tourist_id::blockchain::anchor_ledger::{AnchorLedger, InMemoryLedger, LedgerClient};
use tourist_id::blockchain::evm_client::EvmLedgerClient;
use tourist_id::config::{IssuerConfig, LedgerBackend};
use tourist_id::services::api_server::ApiServer;
use tourist_id::services::credential_issuer::CredentialIssuer;
use tourist_id::services::verifier::Verifier;
use tourist_id::wallet::key_management::KeyManager;

#[derive(Parser)]
#[command(name = "tourist-id-issuer", version, about = "Issue and verify Digital Tourist IDs")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve,
    /// Print the issuer address derived from ISSUER_PRIVATE_KEY
    Address,
    /// Mark an issuer as trusted on the registry (registry owner only)
    SetTrusted {
        /// Issuer address
        address: String,
        /// Clear the flag instead of setting it
        #[arg(long)]
        untrust: bool,
        /// Owner key; falls back to the issuer key
        #[arg(long, env = "OWNER_PRIVATE_KEY", hide_env_values = true)]
        owner_key: Option<String>,
    },
}

/// Builds the ledger client for the configured backend, signing with `wallet`.
async fn ledger_client(
    config: &IssuerConfig,
    wallet: LocalWallet,
) -> anyhow::Result<(Arc<dyn LedgerClient>, Option<Address>)> {
    match config.ledger_backend {
        LedgerBackend::Memory => Ok((Arc::new(InMemoryLedger::new()), None)),
        LedgerBackend::Evm => {
            let registry = config
                .registry_address
                .context("REGISTRY_CONTRACT_ADDRESS must be set for the evm ledger backend")?;
            let client = EvmLedgerClient::connect(
                &config.rpc_url,
                registry,
                wallet,
                config.chain_id,
                config.tx_options,
            )
            .await
            .context("failed to connect to the registry")?;
            Ok((Arc::new(client), Some(registry)))
        }
    }
}

async fn serve(config: IssuerConfig, keys: KeyManager) -> anyhow::Result<()> {
    let (client, registry) = ledger_client(&config, keys.wallet().clone()).await?;
    let ledger = AnchorLedger::new(client, config.ledger_timeout);
    let backend = ledger.backend_name();

    let api_server = ApiServer::new(
        CredentialIssuer::new(keys, ledger.clone()),
        Verifier::new(ledger),
        registry,
        backend,
        config.request_timeout,
    );

    info!("Available endpoints:");
    info!("- POST /issue-id");
    info!("- POST /verify-id");
    info!("- POST /verify-id/policy");
    info!("- GET  /issuers/:address/trusted");
    info!("- GET  /health");

    api_server
        .run(config.bind_addr)
        .await
        .with_context(|| format!("server on {} failed", config.bind_addr))
}

async fn set_trusted(
    config: IssuerConfig,
    keys: KeyManager,
    issuer: &str,
    trusted: bool,
    owner_key: Option<String>,
) -> anyhow::Result<()> {
    let issuer: Address = issuer
        .parse()
        .map_err(|_| anyhow::anyhow!("invalid issuer address {:?}", issuer))?;
    if config.ledger_backend != LedgerBackend::Evm {
        bail!("set-trusted needs the evm ledger backend");
    }
    let owner = match owner_key {
        Some(key) => KeyManager::from_private_key(&key).context("invalid owner key")?,
        None => keys,
    };
    let (client, _) = ledger_client(&config, owner.wallet().clone()).await?;
    let ledger = AnchorLedger::new(client, config.ledger_timeout);

    let receipt = ledger
        .set_trusted(issuer, trusted)
        .await
        .context("setTrustedIssuer failed")?;
    info!(
        "issuer {} trusted={} ({})",
        to_checksum(&issuer, None),
        trusted,
        receipt.ledger_ref
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = IssuerConfig::from_env().context("invalid configuration")?;
    let keys = KeyManager::from_private_key(&config.issuer_private_key).context("invalid ISSUER_PRIVATE_KEY")?;
    info!("issuer address {}", to_checksum(&keys.address(), None));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, keys).await,
        Command::Address => {
            println!("{}", to_checksum(&keys.address(), None));
            Ok(())
        }
        Command::SetTrusted {
            address,
            untrust,
            owner_key,
        } => set_trusted(config, keys, &address, !untrust, owner_key).await,
    }
}
