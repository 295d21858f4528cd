// src/models/anchor.rs
//! Ledger-facing value types: the content digest used as anchor key, the
//! identity recorded against it, and the receipt of an anchoring write.

use ethers_core::types::{Address, H256};
use ethers_core::utils::{hex, to_checksum};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A 32-byte SHA-256 content digest.
///
/// Rendered as `0x`-prefixed lowercase hex, which is also its JSON form.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Digest(bytes)
    }
}

impl From<Digest> for H256 {
    fn from(digest: Digest) -> Self {
        H256::from(digest.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw).map_err(|e| format!("invalid digest hex: {}", e))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| format!("digest must be 32 bytes, got {}", b.len()))?;
        Ok(Digest(bytes))
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// The submitter recorded for a digest, or the absence of any record.
///
/// `Absent` is a separate state and is never confused with the zero address:
/// backends that report "no record" as `0x0` are mapped to `Absent` on read.
/// Serializes as an EIP-55 checksummed address string or `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorIdentity {
    Anchored(Address),
    Absent,
}

impl AnchorIdentity {
    /// Maps the ledger's raw answer, where the zero address means "not anchored".
    pub fn from_ledger_address(address: Address) -> Self {
        if address.is_zero() {
            AnchorIdentity::Absent
        } else {
            AnchorIdentity::Anchored(address)
        }
    }

    pub fn address(&self) -> Option<Address> {
        match self {
            AnchorIdentity::Anchored(a) => Some(*a),
            AnchorIdentity::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, AnchorIdentity::Absent)
    }
}

impl Serialize for AnchorIdentity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            AnchorIdentity::Anchored(a) => serializer.serialize_str(&to_checksum(a, None)),
            AnchorIdentity::Absent => serializer.serialize_none(),
        }
    }
}

/// Confirmation of a successful anchoring write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerReceipt {
    /// Transaction hash on an EVM ledger, or a backend-specific reference.
    pub ledger_ref: String,
    pub block_number: Option<u64>,
}

/// Serializes an address in EIP-55 checksum form.
pub fn serialize_checksummed<S: Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_checksum(address, None))
}
