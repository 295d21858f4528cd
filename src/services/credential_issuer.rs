// src/services/credential_issuer.rs
//! Credential Issuer Service
//!
//! Builds Tourist ID credentials from caller attributes and anchors them:
//!
//! 1. fill defaults for omitted attributes
//! 2. sign the canonical pre-signature form with the issuer key
//! 3. attach the signature
//! 4. hash the issued form (signature included) into the anchor digest
//! 5. record `digest -> issuer address` on the ledger and wait for confirmation

use crate::blockchain::anchor_ledger::AnchorLedger;
use crate::error::Error;
use crate::models::anchor::{Digest, LedgerReceipt};
use crate::models::credential::{
    CredentialAttributes, IssuedCredential, Timestamp, UnsignedCredential, CREDENTIALS_CONTEXT_V1,
    DIGITAL_TOURIST_ID_TYPE, VERIFIABLE_CREDENTIAL_TYPE,
};
use crate::utils::crypto::{anchor_digest, document_hash};
use crate::utils::serialization::signing_message;
use crate::wallet::key_management::KeyManager;
use chrono::Duration as ChronoDuration;
use ethers_core::types::Address;
use log::{debug, info, warn};
use serde::Serialize;

pub const DEFAULT_TOURIST_NAME: &str = "John Doe";
pub const DEFAULT_ISSUING_AUTHORITY: &str = "Ministry of Tourism";
pub const DEFAULT_DOCUMENT: &str = "passport-sample";
pub const DEFAULT_EMERGENCY_CONTACT: &str = "+0000000000";
pub const DEFAULT_VALIDITY_DAYS: i64 = 30;

/// A freshly issued and anchored credential.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issuance {
    pub credential: IssuedCredential,
    pub anchor_digest: Digest,
    pub ledger_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

/// Service that signs and anchors Tourist IDs.
///
/// Holds only read-only state, so one instance serves concurrent requests.
#[derive(Clone)]
pub struct CredentialIssuer {
    keys: KeyManager,
    ledger: AnchorLedger,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl CredentialIssuer {
    pub fn new(keys: KeyManager, ledger: AnchorLedger) -> Self {
        Self { keys, ledger }
    }

    /// Address recorded on the ledger and recovered from signatures.
    pub fn issuer_address(&self) -> Address {
        self.keys.address()
    }

    /// Assembles the unsigned credential, filling defaults relative to `now`.
    ///
    /// # Errors
    /// [`Error::Validation`] for unparseable timestamps or an inverted window.
    pub fn build_unsigned(attrs: CredentialAttributes, now: Timestamp) -> Result<UnsignedCredential, Error> {
        let valid_from = match non_empty(attrs.valid_from) {
            Some(s) => Timestamp::parse(&s)?,
            None => now,
        };
        let valid_until = match non_empty(attrs.valid_until) {
            Some(s) => Timestamp::parse(&s)?,
            None => Timestamp::new(now.as_datetime() + ChronoDuration::days(DEFAULT_VALIDITY_DAYS)),
        };
        let document_hash = non_empty(attrs.document_hash).unwrap_or_else(|| {
            document_hash(&non_empty(attrs.document).unwrap_or_else(|| DEFAULT_DOCUMENT.to_string()))
        });

        let unsigned = UnsignedCredential {
            context: vec![CREDENTIALS_CONTEXT_V1.to_string()],
            types: vec![
                VERIFIABLE_CREDENTIAL_TYPE.to_string(),
                DIGITAL_TOURIST_ID_TYPE.to_string(),
            ],
            tourist_name: non_empty(attrs.tourist_name).unwrap_or_else(|| DEFAULT_TOURIST_NAME.to_string()),
            issuing_authority: non_empty(attrs.issuing_authority)
                .unwrap_or_else(|| DEFAULT_ISSUING_AUTHORITY.to_string()),
            document_hash,
            valid_from,
            valid_until,
            emergency_contact: non_empty(attrs.emergency_contact)
                .unwrap_or_else(|| DEFAULT_EMERGENCY_CONTACT.to_string()),
            issued_at: now,
        };
        unsigned.validate()?;
        Ok(unsigned)
    }

    /// Signs an unsigned credential without touching the ledger.
    pub async fn sign(&self, unsigned: UnsignedCredential) -> Result<IssuedCredential, Error> {
        let message = signing_message(&unsigned)?;
        let signature = self.keys.sign_message(&message).await?;
        Ok(unsigned.attach_signature(signature))
    }

    /// Issues a credential stamped with the current time.
    pub async fn issue(&self, attrs: CredentialAttributes) -> Result<Issuance, Error> {
        self.issue_at(attrs, Timestamp::now()).await
    }

    /// Issues a credential as of `now`.
    ///
    /// # Errors
    /// - [`Error::Validation`] for bad attributes (nothing is signed or sent)
    /// - [`Error::Ledger`] if anchoring is rejected, unreachable or times out
    pub async fn issue_at(&self, attrs: CredentialAttributes, now: Timestamp) -> Result<Issuance, Error> {
        let unsigned = Self::build_unsigned(attrs, now)?;
        let credential = self.sign(unsigned).await?;
        let digest = anchor_digest(&credential)?;
        debug!("anchor digest {} for credential issued at {}", digest, now);

        let LedgerReceipt {
            ledger_ref,
            block_number,
        } = self
            .ledger
            .write(digest, self.keys.address())
            .await
            .map_err(|e| {
                warn!("anchoring {} failed: {}", digest, e);
                Error::from(e)
            })?;

        info!("issued tourist id {} ({})", digest, ledger_ref);
        Ok(Issuance {
            credential,
            anchor_digest: digest,
            ledger_ref,
            block_number,
        })
    }
}
