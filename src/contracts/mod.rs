// src/contracts/mod.rs
pub mod tourist_id_registry;
