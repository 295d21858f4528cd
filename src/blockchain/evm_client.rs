// src/blockchain/evm_client.rs
//! EVM ledger client.
//!
//! Talks JSON-RPC over HTTP to a chain hosting `TouristIDRegistry` (Polygon Amoy
//! by default). Reads go through the bare provider; writes go through a
//! [`SignerMiddleware`] holding the issuer wallet, so the contract records the
//! issuer's address as `msg.sender`.

use crate::blockchain::anchor_ledger::LedgerClient;
use crate::contracts::tourist_id_registry::{TouristIdRegistry, TxOptions, TxOutcome};
use crate::error::{Error, LedgerError};
use crate::models::anchor::{AnchorIdentity, Digest, LedgerReceipt};
use async_trait::async_trait;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, MiddlewareError, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers_contract::ContractError;
use ethers_core::types::{Address, TransactionReceipt, H256};
use log::{error, info, warn};

type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Ledger client for the on-chain registry.
pub struct EvmLedgerClient {
    reader: TouristIdRegistry<Provider<Http>>,
    writer: TouristIdRegistry<SignerClient>,
    submitter: Address,
    tx_options: TxOptions,
}

impl EvmLedgerClient {
    /// Builds the client.
    ///
    /// # Arguments
    /// * `rpc_url` - JSON-RPC endpoint
    /// * `registry` - deployed `TouristIDRegistry` address
    /// * `wallet` - key that signs transactions; must be the issuer key for anchoring
    /// * `chain_id` - when `None`, fetched from the node
    ///
    /// # Errors
    /// [`Error::Configuration`] for a bad URL, [`Error::Ledger`] if the chain id
    /// lookup fails.
    pub async fn connect(
        rpc_url: &str,
        registry: Address,
        wallet: LocalWallet,
        chain_id: Option<u64>,
        tx_options: TxOptions,
    ) -> Result<Self, Error> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| Error::Configuration(format!("invalid RPC URL {:?}: {}", rpc_url, e)))?
            .interval(tx_options.poll_interval);

        let chain_id = match chain_id {
            Some(id) => id,
            None => provider
                .get_chainid()
                .await
                .map_err(|e| Error::Ledger(classify_middleware_error(&e)))?
                .as_u64(),
        };

        let wallet = wallet.with_chain_id(chain_id);
        let submitter = wallet.address();
        let signer = SignerMiddleware::new(provider.clone(), wallet);

        info!(
            "EVM ledger: chain {} registry {:?} submitter {:?}",
            chain_id, registry, submitter
        );

        Ok(Self {
            reader: TouristIdRegistry::new(registry, provider.into())?,
            writer: TouristIdRegistry::new(registry, signer.into())?,
            submitter,
            tx_options,
        })
    }

    fn receipt(receipt: TransactionReceipt) -> LedgerReceipt {
        LedgerReceipt {
            ledger_ref: format!("{:?}", receipt.transaction_hash),
            block_number: receipt.block_number.map(|b| b.as_u64()),
        }
    }

    fn settle(outcome: TxOutcome) -> Result<LedgerReceipt, LedgerError> {
        match outcome {
            TxOutcome::Confirmed(receipt) => Ok(Self::receipt(receipt)),
            TxOutcome::Reverted(receipt) => Err(LedgerError::Rejected(format!(
                "transaction {:?} reverted",
                receipt.transaction_hash
            ))),
            TxOutcome::Dropped(hash) => Err(LedgerError::Unavailable(format!(
                "transaction {:?} was dropped before inclusion",
                hash
            ))),
        }
    }
}

/// Sorts a JSON-RPC failure: an error *response* means the node answered and
/// refused; anything else means it could not be reached or understood.
fn classify_middleware_error<E: MiddlewareError>(e: &E) -> LedgerError {
    if e.as_error_response().is_some() {
        LedgerError::Rejected(e.to_string())
    } else {
        LedgerError::Unavailable(e.to_string())
    }
}

pub(crate) fn classify_contract_error<M: Middleware>(err: ContractError<M>) -> LedgerError {
    match &err {
        ContractError::Revert(data) => LedgerError::Rejected(format!("execution reverted: {}", data)),
        ContractError::MiddlewareError { e } => classify_middleware_error(e),
        ContractError::ProviderError { e } => classify_middleware_error(e),
        _ => LedgerError::Rejected(err.to_string()),
    }
}

#[async_trait]
impl LedgerClient for EvmLedgerClient {
    async fn submit_anchor(&self, digest: Digest, issuer: Address) -> Result<LedgerReceipt, LedgerError> {
        if issuer != self.submitter {
            return Err(LedgerError::Rejected(format!(
                "ledger wallet {:?} cannot anchor on behalf of {:?}",
                self.submitter, issuer
            )));
        }
        let outcome = self
            .writer
            .anchor_credential(H256::from(digest), self.tx_options)
            .await
            .map_err(|e| {
                let err = classify_contract_error(e);
                error!("anchorCredential({}) failed: {}", digest, err);
                err
            })?;
        Self::settle(outcome)
    }

    async fn read_anchor(&self, digest: Digest) -> Result<AnchorIdentity, LedgerError> {
        let address = self
            .reader
            .credential_anchor(H256::from(digest))
            .await
            .map_err(|e| {
                let err = classify_contract_error(e);
                warn!("credentialAnchor({}) failed: {}", digest, err);
                err
            })?;
        Ok(AnchorIdentity::from_ledger_address(address))
    }

    async fn is_trusted_issuer(&self, issuer: Address) -> Result<bool, LedgerError> {
        self.reader
            .trusted_issuers(issuer)
            .await
            .map_err(classify_contract_error)
    }

    async fn set_trusted_issuer(&self, issuer: Address, trusted: bool) -> Result<LedgerReceipt, LedgerError> {
        let outcome = self
            .writer
            .set_trusted_issuer(issuer, trusted, self.tx_options)
            .await
            .map_err(classify_contract_error)?;
        Self::settle(outcome)
    }

    fn backend_name(&self) -> &'static str {
        "evm"
    }
}
