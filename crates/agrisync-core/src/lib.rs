//! agrisync-core - Core library for AgriSync
//!
//! This crate contains the farm record models, the local durable store, the
//! pending-change queue and the reconciliation logic that replays queued
//! changes against the remote service when connectivity returns.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod network;
pub mod remote;
pub mod services;
pub mod state;
pub mod sync;
pub mod util;

pub use config::SyncSettings;
pub use error::{Error, Result};
pub use models::{
    Activity, Collection, Crop, Livestock, MarketPrice, PendingChange, QueueEntry, Record,
    RecordKey, Tracked, Transaction, WeatherSnapshot,
};
pub use network::{is_slow, NetworkMonitor, NetworkStatus};
pub use services::{FarmService, Saved, Store};
pub use state::SyncState;
pub use sync::{ClearPolicy, ReconcileOutcome, Reconciler, SyncReport};
