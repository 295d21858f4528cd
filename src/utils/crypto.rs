// src/utils/crypto.rs
//! Digest engine.
//!
//! SHA-256 over arbitrary bytes, plus the anchor-key computation over an issued
//! credential. The signature message is a different byte string; see
//! [`signing_message`](crate::utils::serialization::signing_message).

use crate::error::Error;
use crate::models::anchor::Digest;
use crate::models::credential::IssuedCredential;
use crate::utils::serialization::issued_bytes;
use sha2::{Digest as _, Sha256};

/// Computes the SHA-256 digest of `data`.
///
/// # Example
/// ```
/// use tourist_id::utils::crypto::hash_data;
/// let digest = hash_data(b"abc");
/// assert_eq!(
///     digest.to_hex(),
///     "0xba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
/// );
/// ```
pub fn hash_data(data: &[u8]) -> Digest {
    let out: [u8; 32] = Sha256::digest(data).into();
    Digest::from(out)
}

/// The ledger key of an issued credential: SHA-256 of its canonical bytes
/// *including* the signature.
pub fn anchor_digest(credential: &IssuedCredential) -> Result<Digest, Error> {
    Ok(hash_data(&issued_bytes(credential)?))
}

/// Default `documentHash` for a document reference.
pub fn document_hash(document: &str) -> String {
    hash_data(document.as_bytes()).to_hex()
}
