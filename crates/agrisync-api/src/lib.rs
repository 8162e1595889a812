//! agrisync-api - reference server for AgriSync clients
//!
//! Accepts record creates and updates from the sync queue and serves weather
//! and market prices. Records are kept in memory only.

pub mod config;
pub mod error;
pub mod records;
pub mod routes;
