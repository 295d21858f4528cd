// src/blockchain/anchor_ledger.rs
//! Anchor ledger adapter.
//!
//! [`LedgerClient`] is the seam to whatever store holds the digest -> issuer
//! mapping: the `TouristIDRegistry` contract in production, [`InMemoryLedger`]
//! for local runs and tests. [`AnchorLedger`] wraps a client with the semantics
//! the issuer relies on:
//! - a digest is anchored at most once; a second write is rejected, never overwritten
//! - every call is bounded by a timeout reported as [`LedgerError::Timeout`]

use crate::error::LedgerError;
use crate::models::anchor::{AnchorIdentity, Digest, LedgerReceipt};
use async_trait::async_trait;
use ethers_core::types::Address;
use log::{debug, warn};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Raw access to a ledger backend.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Records `issuer` as the submitter of `digest` and waits for confirmation.
    async fn submit_anchor(&self, digest: Digest, issuer: Address) -> Result<LedgerReceipt, LedgerError>;

    /// Reads the submitter recorded for `digest`.
    async fn read_anchor(&self, digest: Digest) -> Result<AnchorIdentity, LedgerError>;

    /// Reads the registry's trust flag for `issuer`.
    async fn is_trusted_issuer(&self, issuer: Address) -> Result<bool, LedgerError>;

    /// Sets the trust flag. Only the registry owner may do this.
    async fn set_trusted_issuer(&self, issuer: Address, trusted: bool) -> Result<LedgerReceipt, LedgerError>;

    /// Short backend label for logs and health output.
    fn backend_name(&self) -> &'static str;
}

/// Timeout-bounded, reject-on-conflict view of a [`LedgerClient`].
#[derive(Clone)]
pub struct AnchorLedger {
    client: Arc<dyn LedgerClient>,
    timeout: Duration,
}

impl AnchorLedger {
    pub fn new(client: Arc<dyn LedgerClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn backend_name(&self) -> &'static str {
        self.client.backend_name()
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!("ledger call exceeded {:?}", self.timeout);
                Err(LedgerError::Timeout(self.timeout))
            }
        }
    }

    /// Anchors `digest` to `issuer`.
    ///
    /// # Errors
    /// - [`LedgerError::AlreadyAnchored`] if any submitter is already recorded
    /// - [`LedgerError::Rejected`], [`LedgerError::Unavailable`] from the backend
    /// - [`LedgerError::Timeout`] if either the pre-check or the write overruns
    pub async fn write(&self, digest: Digest, issuer: Address) -> Result<LedgerReceipt, LedgerError> {
        if let AnchorIdentity::Anchored(anchored_by) = self.read(digest).await? {
            return Err(LedgerError::AlreadyAnchored { digest, anchored_by });
        }
        debug!("anchoring {} for {:?}", digest, issuer);
        self.bounded(self.client.submit_anchor(digest, issuer)).await
    }

    pub async fn read(&self, digest: Digest) -> Result<AnchorIdentity, LedgerError> {
        self.bounded(self.client.read_anchor(digest)).await
    }

    pub async fn is_trusted(&self, issuer: Address) -> Result<bool, LedgerError> {
        self.bounded(self.client.is_trusted_issuer(issuer)).await
    }

    pub async fn set_trusted(&self, issuer: Address, trusted: bool) -> Result<LedgerReceipt, LedgerError> {
        self.bounded(self.client.set_trusted_issuer(issuer, trusted)).await
    }
}

/// Process-local ledger with the registry contract's semantics.
///
/// Anchors are insert-if-absent under a write lock, so two concurrent writes of
/// the same digest resolve to exactly one winner.
#[derive(Default)]
pub struct InMemoryLedger {
    anchors: RwLock<HashMap<Digest, Address>>,
    trusted: RwLock<HashMap<Address, bool>>,
    sequence: AtomicU64,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_ref(&self) -> LedgerReceipt {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        LedgerReceipt {
            ledger_ref: format!("memory:{}", n),
            block_number: Some(n),
        }
    }

    pub async fn anchor_count(&self) -> usize {
        self.anchors.read().await.len()
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn submit_anchor(&self, digest: Digest, issuer: Address) -> Result<LedgerReceipt, LedgerError> {
        if issuer.is_zero() {
            return Err(LedgerError::Rejected("zero address cannot anchor".into()));
        }
        let mut anchors = self.anchors.write().await;
        if let Some(existing) = anchors.get(&digest) {
            return Err(LedgerError::AlreadyAnchored {
                digest,
                anchored_by: *existing,
            });
        }
        anchors.insert(digest, issuer);
        Ok(self.next_ref())
    }

    async fn read_anchor(&self, digest: Digest) -> Result<AnchorIdentity, LedgerError> {
        Ok(self
            .anchors
            .read()
            .await
            .get(&digest)
            .map_or(AnchorIdentity::Absent, |a| AnchorIdentity::Anchored(*a)))
    }

    async fn is_trusted_issuer(&self, issuer: Address) -> Result<bool, LedgerError> {
        Ok(self.trusted.read().await.get(&issuer).copied().unwrap_or(false))
    }

    async fn set_trusted_issuer(&self, issuer: Address, trusted: bool) -> Result<LedgerReceipt, LedgerError> {
        self.trusted.write().await.insert(issuer, trusted);
        Ok(self.next_ref())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
