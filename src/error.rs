// src/error.rs
//! Error kinds surfaced by the issuer core.
//!
//! Every failure that reaches a caller is one of a small set of inspectable kinds.
//! A credential that simply fails to verify is *not* an error: that outcome is a
//! normal [`VerificationReport`](crate::services::verifier::VerificationReport)
//! with `ok == false`.

use crate::models::anchor::Digest;
use ethers_core::types::Address;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by a ledger backend or by the anchor adapter around it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The node could not be reached or the transport failed.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The adapter deadline elapsed before the ledger answered.
    #[error("ledger call timed out after {0:?}")]
    Timeout(Duration),

    /// The ledger answered and refused the operation (revert, authorization, failed receipt).
    #[error("ledger rejected the operation: {0}")]
    Rejected(String),

    /// The digest already has an authoritative submitter; anchors are never overwritten.
    #[error("digest {digest} is already anchored by {anchored_by:?}")]
    AlreadyAnchored { digest: Digest, anchored_by: Address },
}

impl LedgerError {
    /// Whether retrying the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Unavailable(_) | LedgerError::Timeout(_))
    }
}

/// Top-level error type of the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid issuer key, ledger address or other startup setting.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Structurally invalid input; no ledger call was attempted.
    #[error("validation error: {0}")]
    Validation(String),

    /// A signature is present but cannot be decoded or recovered.
    #[error("signature error: {0}")]
    Signature(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The per-request deadline elapsed.
    #[error("request timed out after {0:?}")]
    RequestTimeout(Duration),
}

impl Error {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "ConfigurationError",
            Error::Validation(_) => "ValidationError",
            Error::Signature(_) => "SignatureError",
            Error::Ledger(LedgerError::Unavailable(_)) => "LedgerUnavailable",
            Error::Ledger(LedgerError::Timeout(_)) => "LedgerTimeout",
            Error::Ledger(LedgerError::Rejected(_)) => "LedgerRejected",
            Error::Ledger(LedgerError::AlreadyAnchored { .. }) => "LedgerRejected",
            Error::RequestTimeout(_) => "RequestTimeout",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Ledger(e) => e.is_retryable(),
            Error::RequestTimeout(_) => true,
            _ => false,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
