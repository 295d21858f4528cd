// src/lib.rs

//! # Tourist ID Issuer
//!
//! Issues Digital Tourist ID verifiable credentials signed with an issuer key
//! and anchored on an EVM registry contract, and verifies presented credentials
//! against those anchors.
//!
//! ## Layers
//! 1. **Models**: credential and anchor types
//! 2. **Utils**: canonical serialization and hashing
//! 3. **Wallet**: issuer key, signing and signer recovery
//! 4. **Contracts / Blockchain**: `TouristIDRegistry` bindings and the ledger adapter
//! 5. **Services**: issuance, verification and the HTTP API

pub mod blockchain; // Ledger adapter and EVM client
pub mod config; // Environment configuration
pub mod contracts; // Registry contract bindings
pub mod error; // Error kinds
pub mod models; // Data structures
pub mod services; // Business logic and API
pub mod utils; // Hashing and canonical form
pub mod wallet; // Cryptographic key operations

pub use error::{Error, LedgerError, Result};
