// src/contracts/tourist_id_registry.rs
//! TouristIDRegistry smart contract interface.
//!
//! The registry keeps two mappings:
//! - `credentialAnchor[bytes32] -> address`: who anchored a credential digest
//! - `trustedIssuers[address] -> bool`: owner-managed issuer trust flags
//!
//! `anchorCredential(hash)` records `msg.sender` for `hash`.

use ethers::providers::Middleware;
use ethers_contract::{BaseContract, Contract, ContractError};
use ethers_core::abi::{parse_abi, Abi};
use ethers_core::types::{Address, TransactionReceipt, H256, U64};
use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;

/// Human-readable ABI of the functions the issuer calls.
pub const REGISTRY_ABI: &[&str] = &[
    "function anchorCredential(bytes32 credentialHash) external",
    "function credentialAnchor(bytes32 credentialHash) external view returns (address)",
    "function trustedIssuers(address issuer) external view returns (bool)",
    "function setTrustedIssuer(address issuer, bool trusted) external",
];

/// Parses [`REGISTRY_ABI`].
pub fn registry_abi() -> Result<Abi, Error> {
    parse_abi(REGISTRY_ABI).map_err(|e| Error::Configuration(format!("invalid registry ABI: {}", e)))
}

/// Options for state-changing calls.
#[derive(Debug, Clone, Copy)]
pub struct TxOptions {
    /// Explicit gas limit for state-changing calls.
    pub gas_limit: u64,
    /// Blocks to wait for after inclusion.
    pub confirmations: usize,
    /// Receipt polling interval.
    pub poll_interval: Duration,
}

impl Default for TxOptions {
    fn default() -> Self {
        Self {
            gas_limit: 200_000,
            confirmations: 1,
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone)]
pub enum TxOutcome {
    Confirmed(TransactionReceipt),
    /// Included but with status 0.
    Reverted(TransactionReceipt),
    /// The node forgot the transaction before it was mined.
    Dropped(H256),
}

/// Typed wrapper over a deployed `TouristIDRegistry`.
///
/// # Type Parameters
/// * `M` - middleware; a plain provider suffices for reads, a signer
///   middleware is needed for writes
pub struct TouristIdRegistry<M> {
    contract: Contract<M>,
}

impl<M: Middleware + 'static> TouristIdRegistry<M> {
    pub fn new(address: Address, client: Arc<M>) -> Result<Self, Error> {
        let base = BaseContract::from(registry_abi()?);
        Ok(Self {
            contract: Contract::new(address, base, client),
        })
    }

    /// Reads `credentialAnchor(hash)`. The zero address means "not anchored".
    pub async fn credential_anchor(&self, hash: H256) -> Result<Address, ContractError<M>> {
        self.contract
            .method::<_, Address>("credentialAnchor", (hash,))?
            .call()
            .await
    }

    pub async fn trusted_issuers(&self, issuer: Address) -> Result<bool, ContractError<M>> {
        self.contract
            .method::<_, bool>("trustedIssuers", (issuer,))?
            .call()
            .await
    }

    /// Sends `anchorCredential(hash)` and waits for the receipt.
    pub async fn anchor_credential(&self, hash: H256, opts: TxOptions) -> Result<TxOutcome, ContractError<M>> {
        let call = self
            .contract
            .method::<_, ()>("anchorCredential", (hash,))?
            .gas(opts.gas_limit);
        let pending = call.send().await?;
        let tx_hash = pending.tx_hash();
        let receipt = pending
            .interval(opts.poll_interval)
            .confirmations(opts.confirmations)
            .await
            .map_err(|e| ContractError::ProviderError { e })?;
        Ok(classify_receipt(tx_hash, receipt))
    }

    /// Sends `setTrustedIssuer(issuer, trusted)`; owner only.
    pub async fn set_trusted_issuer(
        &self,
        issuer: Address,
        trusted: bool,
        opts: TxOptions,
    ) -> Result<TxOutcome, ContractError<M>> {
        let call = self
            .contract
            .method::<_, ()>("setTrustedIssuer", (issuer, trusted))?;
        let pending = call.send().await?;
        let tx_hash = pending.tx_hash();
        let receipt = pending
            .interval(opts.poll_interval)
            .confirmations(opts.confirmations)
            .await
            .map_err(|e| ContractError::ProviderError { e })?;
        Ok(classify_receipt(tx_hash, receipt))
    }
}

fn classify_receipt(tx_hash: H256, receipt: Option<TransactionReceipt>) -> TxOutcome {
    match receipt {
        None => TxOutcome::Dropped(tx_hash),
        Some(r) if r.status == Some(U64::from(0)) => TxOutcome::Reverted(r),
        Some(r) => TxOutcome::Confirmed(r),
    }
}
