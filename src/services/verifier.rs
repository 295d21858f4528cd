// src/services/verifier.rs
//! Credential verification service.
//!
//! [`Verifier::verify`] answers one question: is this credential
//! cryptographically self-consistent with its ledger anchor? It recomputes two
//! byte strings from the presented credential:
//! - the signing message (unsigned form), from which the signer is recovered
//! - the anchor digest (issued form), under which the ledger is queried
//!
//! and reports `ok` when the recovered signer is the recorded submitter.
//!
//! Whether the issuer is currently trusted and whether the credential is inside
//! its validity window are separate questions, answered by [`Verifier::evaluate_policy`].

use crate::blockchain::anchor_ledger::AnchorLedger;
use crate::error::Error;
use crate::models::anchor::{serialize_checksummed, AnchorIdentity, Digest};
use crate::models::credential::{IssuedCredential, Timestamp, ValidityStatus};
use crate::utils::crypto::anchor_digest;
use crate::utils::serialization::signing_message;
use crate::wallet::key_management::recover_signer;
use ethers_core::types::Address;
use log::{debug, info};
use serde::Serialize;

/// Result of a verification that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    /// Signer recovered and anchor present and equal.
    pub ok: bool,
    #[serde(serialize_with = "serialize_checksummed")]
    pub signer_identity: Address,
    pub anchor_identity: AnchorIdentity,
    pub anchor_digest: Digest,
}

/// Cryptographic report combined with the trust and time checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyReport {
    pub report: VerificationReport,
    pub issuer_trusted: bool,
    pub validity: ValidityStatus,
    /// `ok && issuer_trusted && validity == Valid`.
    pub accepted: bool,
}

impl PolicyReport {
    pub fn evaluate(report: VerificationReport, issuer_trusted: bool, validity: ValidityStatus) -> Self {
        let accepted = report.ok && issuer_trusted && validity == ValidityStatus::Valid;
        Self {
            report,
            issuer_trusted,
            validity,
            accepted,
        }
    }
}

#[derive(Clone)]
pub struct Verifier {
    ledger: AnchorLedger,
}

impl Verifier {
    pub fn new(ledger: AnchorLedger) -> Self {
        Self { ledger }
    }

    /// Verifies a credential against its ledger anchor.
    ///
    /// # Returns
    /// A report; `ok == false` is a normal outcome, not an error.
    ///
    /// # Errors
    /// - [`Error::Validation`] if the credential violates its schema invariants
    /// - [`Error::Signature`] if the signature cannot be decoded or recovered
    /// - [`Error::Ledger`] if the anchor lookup fails
    pub async fn verify(&self, credential: &IssuedCredential) -> Result<VerificationReport, Error> {
        let message = signing_message(credential.unsigned())?;
        let digest = anchor_digest(credential)?;

        let signer_identity = recover_signer(credential.signature(), &message)?;
        let anchor_identity = self.ledger.read(digest).await?;

        let ok = anchor_identity.address() == Some(signer_identity);
        debug!(
            "verify {}: signer {:?}, anchor {:?}",
            digest, signer_identity, anchor_identity
        );
        info!("verified credential {}: ok={}", digest, ok);

        Ok(VerificationReport {
            ok,
            signer_identity,
            anchor_identity,
            anchor_digest: digest,
        })
    }

    /// Reads the registry's trust flag for an issuer.
    pub async fn issuer_trusted(&self, issuer: Address) -> Result<bool, Error> {
        Ok(self.ledger.is_trusted(issuer).await?)
    }

    /// Verifies, then applies the trust predicate to the recovered signer and
    /// the validity window at `now`.
    pub async fn evaluate_policy(
        &self,
        credential: &IssuedCredential,
        now: Timestamp,
    ) -> Result<PolicyReport, Error> {
        let report = self.verify(credential).await?;
        let issuer_trusted = self.issuer_trusted(report.signer_identity).await?;
        let validity = credential.unsigned().validity_at(now);
        Ok(PolicyReport::evaluate(report, issuer_trusted, validity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::anchor_ledger::InMemoryLedger;
    use crate::models::credential::CredentialAttributes;
    use crate::services::credential_issuer::CredentialIssuer;
    use crate::utils::crypto::document_hash;
    use crate::wallet::key_management::KeyManager;
    use chrono::{FixedOffset, SecondsFormat};
    use ethers::signers::LocalWallet;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;

    struct Fixture {
        issuer: CredentialIssuer,
        verifier: Verifier,
        ledger: AnchorLedger,
    }

    fn fixture() -> Fixture {
        let ledger = AnchorLedger::new(Arc::new(InMemoryLedger::new()), Duration::from_secs(5));
        let keys = KeyManager::from_wallet(LocalWallet::new(&mut rand::thread_rng()));
        Fixture {
            issuer: CredentialIssuer::new(keys, ledger.clone()),
            verifier: Verifier::new(ledger.clone()),
            ledger,
        }
    }

    fn asha() -> CredentialAttributes {
        CredentialAttributes {
            tourist_name: Some("Asha Rao".into()),
            issuing_authority: Some("Ministry of Tourism".into()),
            document_hash: Some(document_hash("passport-sample")),
            emergency_contact: Some("+911234567890".into()),
            ..Default::default()
        }
    }

    fn presented(credential: &IssuedCredential, field: &str, value: Value) -> Result<IssuedCredential, Error> {
        let mut json = serde_json::to_value(credential).unwrap();
        json[field] = value;
        IssuedCredential::try_from(json)
    }

    fn tampered(credential: &IssuedCredential, field: &str, value: Value) -> IssuedCredential {
        presented(credential, field, value).unwrap()
    }

    #[tokio::test]
    async fn issued_credential_verifies() {
        let f = fixture();
        let issuance = f.issuer.issue(asha()).await.unwrap();

        let report = f.verifier.verify(&issuance.credential).await.unwrap();
        assert!(report.ok);
        assert_eq!(report.signer_identity, f.issuer.issuer_address());
        assert_eq!(report.anchor_identity, AnchorIdentity::Anchored(f.issuer.issuer_address()));
        assert_eq!(report.anchor_digest, issuance.anchor_digest);

        let unsigned = issuance.credential.unsigned();
        assert_eq!(unsigned.tourist_name, "Asha Rao");
        assert_eq!(unsigned.emergency_contact, "+911234567890");
        assert_eq!(unsigned.document_hash, document_hash("passport-sample"));
    }

    #[tokio::test]
    async fn verifies_after_json_round_trip() {
        let f = fixture();
        let issuance = f.issuer.issue(asha()).await.unwrap();
        let wire = serde_json::to_string(&issuance.credential).unwrap();
        let presented = IssuedCredential::try_from(serde_json::from_str::<Value>(&wire).unwrap()).unwrap();
        assert!(f.verifier.verify(&presented).await.unwrap().ok);
    }

    #[tokio::test]
    async fn any_field_mutation_fails() {
        let f = fixture();
        let issuance = f.issuer.issue(asha()).await.unwrap();
        let credential = &issuance.credential;
        let valid_until = credential.unsigned().valid_until.as_datetime();
        let ist = FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap();

        let mutations = [
            ("touristName", json!("Asha R.")),
            ("issuingAuthority", json!("Ministry of Magic")),
            ("documentHash", json!(document_hash("passport-forged"))),
            ("validFrom", json!("2020-01-01T00:00:00.000Z")),
            ("validUntil", json!("2099-01-01T00:00:00.000Z")),
            ("emergencyContact", json!("+910000000000")),
            ("issuedAt", json!("2020-01-01T00:00:00.000Z")),
            ("type", json!(["VerifiableCredential"])),
            ("@context", json!(["https://example.org/ctx"])),
            (
                "validUntil",
                json!(valid_until.to_rfc3339_opts(SecondsFormat::Millis, true).replace('Z', "999Z")),
            ),
            (
                "validUntil",
                json!(valid_until.with_timezone(&ist).to_rfc3339_opts(SecondsFormat::Millis, false)),
            ),
        ];
        for (field, value) in mutations {
            match presented(credential, field, value.clone()) {
                Ok(forged) => {
                    let report = f.verifier.verify(&forged).await.unwrap();
                    assert!(!report.ok, "mutating {} to {} still verified", field, value);
                    assert!(report.anchor_identity.is_absent(), "{}", field);
                }
                Err(err) => assert_eq!(err.kind(), "ValidationError", "{} = {}", field, value),
            }
        }
    }

    #[tokio::test]
    async fn rewritten_timestamp_text_is_rejected() {
        let f = fixture();
        let issuance = f.issuer.issue(asha()).await.unwrap();
        let credential = &issuance.credential;
        let canonical = credential.unsigned().valid_until.to_canonical_string();

        let sub_milli = canonical.replace('Z', "999Z");
        let offset = credential
            .unsigned()
            .valid_until
            .as_datetime()
            .with_timezone(&FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap())
            .to_rfc3339_opts(SecondsFormat::Millis, false);
        assert_ne!(offset, canonical);

        for text in [sub_milli, offset] {
            let err = presented(credential, "validUntil", json!(text)).unwrap_err();
            assert_eq!(err.kind(), "ValidationError", "{}", text);
        }

        let same = presented(credential, "validUntil", json!(canonical)).unwrap();
        assert!(f.verifier.verify(&same).await.unwrap().ok);
    }

    #[tokio::test]
    async fn never_anchored_credential_is_not_ok() {
        let f = fixture();
        let unsigned = CredentialIssuer::build_unsigned(asha(), Timestamp::now()).unwrap();
        let credential = f.issuer.sign(unsigned).await.unwrap();

        let report = f.verifier.verify(&credential).await.unwrap();
        assert!(!report.ok);
        assert_eq!(report.anchor_identity, AnchorIdentity::Absent);
        assert_eq!(report.signer_identity, f.issuer.issuer_address());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["anchorIdentity"], Value::Null);
    }

    #[tokio::test]
    async fn anchor_by_someone_else_is_not_ok() {
        let f = fixture();
        let unsigned = CredentialIssuer::build_unsigned(asha(), Timestamp::now()).unwrap();
        let credential = f.issuer.sign(unsigned).await.unwrap();
        let squatter = Address::repeat_byte(0x5e);
        f.ledger.write(anchor_digest(&credential).unwrap(), squatter).await.unwrap();

        let report = f.verifier.verify(&credential).await.unwrap();
        assert!(!report.ok);
        assert_eq!(report.anchor_identity, AnchorIdentity::Anchored(squatter));
    }

    #[tokio::test]
    async fn swapped_signature_is_not_ok() {
        let f = fixture();
        let a = f.issuer.issue(asha()).await.unwrap();
        let other = f
            .issuer
            .issue(CredentialAttributes {
                tourist_name: Some("Ravi Kumar".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        let forged = tampered(&a.credential, "signature", json!(other.credential.signature()));
        let report = f.verifier.verify(&forged).await.unwrap();
        assert!(!report.ok);
    }

    #[tokio::test]
    async fn malformed_signature_is_an_error() {
        let f = fixture();
        let issuance = f.issuer.issue(asha()).await.unwrap();
        let forged = tampered(&issuance.credential, "signature", json!("0xdeadbeef"));
        let err = f.verifier.verify(&forged).await.unwrap_err();
        assert_eq!(err.kind(), "SignatureError");
    }

    #[tokio::test]
    async fn policy_is_separate_from_ok() {
        let f = fixture();
        let issuance = f.issuer.issue(asha()).await.unwrap();
        let now = issuance.credential.unsigned().valid_from;

        let untrusted = f.verifier.evaluate_policy(&issuance.credential, now).await.unwrap();
        assert!(untrusted.report.ok);
        assert!(!untrusted.issuer_trusted);
        assert_eq!(untrusted.validity, ValidityStatus::Valid);
        assert!(!untrusted.accepted);

        f.ledger.set_trusted(f.issuer.issuer_address(), true).await.unwrap();
        let trusted = f.verifier.evaluate_policy(&issuance.credential, now).await.unwrap();
        assert!(trusted.accepted);

        let later = Timestamp::parse("2999-01-01T00:00:00Z").unwrap();
        let expired = f.verifier.evaluate_policy(&issuance.credential, later).await.unwrap();
        assert!(expired.report.ok);
        assert_eq!(expired.validity, ValidityStatus::Expired);
        assert!(!expired.accepted);
    }
}
