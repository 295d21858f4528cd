// src/config.rs
//! Issuer configuration.
//!
//! Loaded once at startup from the process environment (after `dotenv` has
//! merged any `.env` file) and passed explicitly to every component that needs it.
//!
//! ## Environment Variables
//! - `ISSUER_PRIVATE_KEY`: issuer secp256k1 key, hex (required)
//! - `REGISTRY_CONTRACT_ADDRESS`: deployed TouristIDRegistry (required for `evm`)
//! - `AMOY_RPC_URL`: JSON-RPC endpoint (default: public Polygon Amoy RPC)
//! - `CHAIN_ID`: skip the chain id lookup when set
//! - `LEDGER_BACKEND`: `evm` (default) or `memory`
//! - `LEDGER_TIMEOUT_SECS`, `REQUEST_TIMEOUT_SECS`, `CONFIRMATIONS`, `ANCHOR_GAS_LIMIT`
//! - `BIND_ADDR` (default `0.0.0.0:3000`), `PORT` overrides just the port

use crate::contracts::tourist_id_registry::TxOptions;
use crate::error::Error;
use config::{Config, Environment};
use ethers_core::types::Address;
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_RPC_URL: &str = "https://rpc-amoy.polygon.technology/";

/// Which ledger the anchor adapter talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    Evm,
    Memory,
}

/// Raw settings as read from the environment.
#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    issuer_private_key: Option<String>,
    registry_contract_address: Option<String>,
    amoy_rpc_url: String,
    chain_id: Option<u64>,
    ledger_backend: LedgerBackend,
    ledger_timeout_secs: u64,
    request_timeout_secs: u64,
    confirmations: usize,
    anchor_gas_limit: u64,
    bind_addr: String,
    port: Option<u16>,
}

/// Validated issuer configuration.
#[derive(Clone)]
pub struct IssuerConfig {
    pub issuer_private_key: String,
    pub registry_address: Option<Address>,
    pub rpc_url: String,
    pub chain_id: Option<u64>,
    pub ledger_backend: LedgerBackend,
    pub ledger_timeout: Duration,
    pub request_timeout: Duration,
    pub tx_options: TxOptions,
    pub bind_addr: SocketAddr,
}

impl std::fmt::Debug for IssuerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuerConfig")
            .field("issuer_private_key", &"<redacted>")
            .field("registry_address", &self.registry_address)
            .field("rpc_url", &self.rpc_url)
            .field("chain_id", &self.chain_id)
            .field("ledger_backend", &self.ledger_backend)
            .field("ledger_timeout", &self.ledger_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}

impl IssuerConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_source(Environment::default())
    }

    /// Reads the configuration from an explicit environment source.
    pub fn from_source(env: Environment) -> Result<Self, Error> {
        let raw: RawConfig = Config::builder()
            .set_default("amoy_rpc_url", DEFAULT_RPC_URL)
            .and_then(|b| b.set_default("ledger_backend", "evm"))
            .and_then(|b| b.set_default("ledger_timeout_secs", 60_i64))
            .and_then(|b| b.set_default("request_timeout_secs", 120_i64))
            .and_then(|b| b.set_default("confirmations", 1_i64))
            .and_then(|b| b.set_default("anchor_gas_limit", 200_000_i64))
            .and_then(|b| b.set_default("bind_addr", "0.0.0.0:3000"))
            .map_err(|e| Error::Configuration(e.to_string()))?
            .add_source(env)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::Configuration(e.to_string()))?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self, Error> {
        let issuer_private_key = raw
            .issuer_private_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Configuration("ISSUER_PRIVATE_KEY must be set".into()))?;

        let registry_address = raw
            .registry_contract_address
            .filter(|a| !a.trim().is_empty())
            .map(|a| {
                a.trim()
                    .parse::<Address>()
                    .map_err(|e| Error::Configuration(format!("REGISTRY_CONTRACT_ADDRESS is invalid: {}", e)))
            })
            .transpose()?;
        if raw.ledger_backend == LedgerBackend::Evm && registry_address.is_none() {
            return Err(Error::Configuration(
                "REGISTRY_CONTRACT_ADDRESS must be set for the evm ledger backend".into(),
            ));
        }

        let mut bind_addr: SocketAddr = raw
            .bind_addr
            .parse()
            .map_err(|e| Error::Configuration(format!("BIND_ADDR is invalid: {}", e)))?;
        if let Some(port) = raw.port {
            bind_addr.set_port(port);
        }

        if raw.ledger_timeout_secs == 0 || raw.request_timeout_secs == 0 {
            return Err(Error::Configuration("timeouts must be positive".into()));
        }

        Ok(Self {
            issuer_private_key,
            registry_address,
            rpc_url: raw.amoy_rpc_url,
            chain_id: raw.chain_id,
            ledger_backend: raw.ledger_backend,
            ledger_timeout: Duration::from_secs(raw.ledger_timeout_secs),
            request_timeout: Duration::from_secs(raw.request_timeout_secs),
            tx_options: TxOptions {
                gas_limit: raw.anchor_gas_limit,
                confirmations: raw.confirmations,
                ..TxOptions::default()
            },
            bind_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::default().source(Some(map))
    }

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn defaults_apply() {
        let cfg = IssuerConfig::from_source(env(&[
            ("ISSUER_PRIVATE_KEY", KEY),
            ("REGISTRY_CONTRACT_ADDRESS", "0x84ab38139f8D8B7F6e1e030C874EE661A0EF16D6"),
        ]))
        .unwrap();
        assert_eq!(cfg.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(cfg.ledger_backend, LedgerBackend::Evm);
        assert_eq!(cfg.ledger_timeout, Duration::from_secs(60));
        assert_eq!(cfg.tx_options.gas_limit, 200_000);
        assert_eq!(cfg.bind_addr.port(), 3000);
        assert!(cfg.chain_id.is_none());
    }

    #[test]
    fn missing_key_is_fatal() {
        let err = IssuerConfig::from_source(env(&[("LEDGER_BACKEND", "memory")])).unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
        assert!(err.to_string().contains("ISSUER_PRIVATE_KEY"));
    }

    #[test]
    fn evm_backend_requires_registry() {
        let err = IssuerConfig::from_source(env(&[("ISSUER_PRIVATE_KEY", KEY)])).unwrap_err();
        assert!(err.to_string().contains("REGISTRY_CONTRACT_ADDRESS"));
    }

    #[test]
    fn memory_backend_and_overrides() {
        let cfg = IssuerConfig::from_source(env(&[
            ("ISSUER_PRIVATE_KEY", KEY),
            ("LEDGER_BACKEND", "memory"),
            ("PORT", "8081"),
            ("CHAIN_ID", "80002"),
            ("LEDGER_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(cfg.ledger_backend, LedgerBackend::Memory);
        assert_eq!(cfg.bind_addr.port(), 8081);
        assert_eq!(cfg.chain_id, Some(80002));
        assert_eq!(cfg.ledger_timeout, Duration::from_secs(5));
    }

    #[test]
    fn bad_registry_address_is_rejected() {
        let err = IssuerConfig::from_source(env(&[
            ("ISSUER_PRIVATE_KEY", KEY),
            ("REGISTRY_CONTRACT_ADDRESS", "0x1234"),
        ]))
        .unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
    }

    #[test]
    fn debug_redacts_key() {
        let cfg = IssuerConfig::from_source(env(&[("ISSUER_PRIVATE_KEY", KEY), ("LEDGER_BACKEND", "memory")])).unwrap();
        assert!(!format!("{:?}", cfg).contains("ac0974"));
    }
}
