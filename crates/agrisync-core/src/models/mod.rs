//! Data models for AgriSync

mod activity;
mod change;
mod crop;
mod livestock;
mod record;
mod reference;
mod transaction;

pub use activity::Activity;
pub use change::{PendingChange, QueueEntry};
pub use crop::Crop;
pub use livestock::Livestock;
pub use record::{ChangeKind, Collection, Record, RecordKey, SyncMeta, Tracked};
pub use reference::{
    seed_market_prices, seed_weather, MarketPrice, Trend, WeatherReport, WeatherSnapshot,
    CURRENT_WEATHER_ID,
};
pub use transaction::{Transaction, TransactionKind};
