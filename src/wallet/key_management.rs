// src/wallet/key_management.rs
//! Issuer key custody and signature recovery.
//!
//! Signatures follow Ethereum `personal_sign` (EIP-191): the message is prefixed
//! with `"\x19Ethereum Signed Message:\n" + len`, hashed with Keccak-256 and
//! signed with recoverable secp256k1 ECDSA. Recovery therefore yields the
//! issuer's Ethereum address, the same identity the ledger records as submitter.

use crate::error::Error;
use ethers::signers::{LocalWallet, Signer};
use ethers_core::types::{Address, Signature};
use ethers_core::utils::hex;
use k256::ecdsa::SigningKey;
use std::str::FromStr;

/// Holds the configured issuer key.
///
/// Cheap to clone and safe to share between concurrent requests: signing only
/// reads the key.
#[derive(Clone, Debug)]
pub struct KeyManager {
    wallet: LocalWallet,
}

impl KeyManager {
    /// Loads the issuer key from a hex string (with or without `0x`).
    ///
    /// # Errors
    /// [`Error::Configuration`] if the string is not hex or not a valid
    /// secp256k1 scalar. Callers treat this as fatal at startup.
    pub fn from_private_key(private_key: &str) -> Result<Self, Error> {
        let trimmed = private_key.trim();
        let raw = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(raw)
            .map_err(|e| Error::Configuration(format!("issuer private key is not hex: {}", e)))?;
        let signing_key = SigningKey::from_slice(&bytes)
            .map_err(|_| Error::Configuration("issuer private key is not a valid secp256k1 key".into()))?;
        Ok(Self {
            wallet: LocalWallet::from(signing_key),
        })
    }

    pub fn from_wallet(wallet: LocalWallet) -> Self {
        Self { wallet }
    }

    /// Ethereum address of the issuer key.
    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub fn wallet(&self) -> &LocalWallet {
        &self.wallet
    }

    /// Signs `message` with EIP-191 prefixing.
    ///
    /// # Returns
    /// `0x`-prefixed hex of the 65-byte `r || s || v` signature.
    pub async fn sign_message(&self, message: &[u8]) -> Result<String, Error> {
        let signature = self
            .wallet
            .sign_message(message)
            .await
            .map_err(|e| Error::Configuration(format!("issuer signer failed: {}", e)))?;
        Ok(format!("0x{}", hex::encode(signature.to_vec())))
    }
}

/// Recovers the address that produced `signature` over `message`.
///
/// Pure: depends only on its inputs.
///
/// # Errors
/// [`Error::Signature`] when the signature is not hex, not 65 bytes, or does
/// not describe a recoverable point.
pub fn recover_signer(signature: &str, message: &[u8]) -> Result<Address, Error> {
    let signature = Signature::from_str(signature.trim())
        .map_err(|e| Error::Signature(format!("malformed signature: {}", e)))?;
    signature
        .recover(message.to_vec())
        .map_err(|e| Error::Signature(format!("signature recovery failed: {}", e)))
}
