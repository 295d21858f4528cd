// src/blockchain/mod.rs
pub mod anchor_ledger;
pub mod evm_client;
