// src/utils/serialization.rs
//! Canonical serialization of credentials.
//!
//! The canonical form is compact JSON with keys in schema order, no whitespace,
//! and serde_json's string escaping. It matches a `JSON.stringify` of an object
//! built in the same key order, which is what relying parties in other stacks
//! reproduce.

use crate::error::Error;
use crate::models::credential::{IssuedCredential, UnsignedCredential};
use serde::Serialize;

fn to_canonical_bytes<T: Serialize>(data: &T) -> Result<Vec<u8>, Error> {
    serde_json::to_vec(data).map_err(|e| Error::Validation(format!("credential serialization failed: {}", e)))
}

/// Canonical bytes of the pre-signature form.
///
/// # Errors
/// [`Error::Validation`] if the credential violates its invariants.
pub fn canonicalize(credential: &UnsignedCredential) -> Result<Vec<u8>, Error> {
    credential.validate()?;
    to_canonical_bytes(credential)
}

/// The message the issuer signs: canonical bytes of the unsigned form.
pub fn signing_message(credential: &UnsignedCredential) -> Result<Vec<u8>, Error> {
    canonicalize(credential)
}

/// Canonical bytes of the issued form, signature included. Input of the anchor digest.
pub fn issued_bytes(credential: &IssuedCredential) -> Result<Vec<u8>, Error> {
    credential.unsigned().validate()?;
    to_canonical_bytes(credential)
}
