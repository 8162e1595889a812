//! Collection and record traits shared by every stored model

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::PendingChange;
use crate::util::now_millis;

/// A named collection in the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Crops,
    Livestock,
    Activities,
    Transactions,
    MarketPrices,
    Weather,
}

impl Collection {
    pub const ALL: [Self; 6] = [
        Self::Crops,
        Self::Livestock,
        Self::Activities,
        Self::Transactions,
        Self::MarketPrices,
        Self::Weather,
    ];

    /// Table backing this collection in the local database
    pub const fn table(self) -> &'static str {
        match self {
            Self::Crops => "crops",
            Self::Livestock => "livestock",
            Self::Activities => "activities",
            Self::Transactions => "transactions",
            Self::MarketPrices => "market_prices",
            Self::Weather => "weather",
        }
    }

    /// Path segment of the matching remote resource
    pub const fn resource(self) -> &'static str {
        match self {
            Self::Crops => "crops",
            Self::Livestock => "livestock",
            Self::Activities => "activities",
            Self::Transactions => "transactions",
            Self::MarketPrices => "market-prices",
            Self::Weather => "weather",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource())
    }
}

impl FromStr for Collection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "crops" | "crop" => Ok(Self::Crops),
            "livestock" => Ok(Self::Livestock),
            "activities" | "activity" => Ok(Self::Activities),
            "transactions" | "transaction" => Ok(Self::Transactions),
            "market-prices" | "market_prices" | "prices" => Ok(Self::MarketPrices),
            "weather" => Ok(Self::Weather),
            other => {
                let known: Vec<&str> = Self::ALL
                    .iter()
                    .map(|collection| collection.resource())
                    .collect();
                Err(Error::InvalidInput(format!(
                    "unknown collection '{other}' (expected one of: {})",
                    known.join(", ")
                )))
            }
        }
    }
}

/// Identifier of a record, unique within its collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordKey {
    Int(i64),
    Text(String),
}

impl RecordKey {
    /// Numeric strings become `Int`, anything else `Text`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        raw.parse::<i64>()
            .map_or_else(|_| Self::Text(raw.to_string()), Self::Int)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for RecordKey {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for RecordKey {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RecordKey {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Synchronization fields carried by every user-editable record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMeta {
    /// Last local mutation (Unix ms), strictly increasing per record
    pub last_modified: i64,
    /// Whether the server acknowledged this exact version
    pub synced: bool,
}

impl SyncMeta {
    /// Stamp a local mutation.
    pub fn touch(&mut self) {
        self.last_modified = now_millis().max(self.last_modified.saturating_add(1));
        self.synced = false;
    }
}

/// A value stored in one of the local collections.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn key(&self) -> RecordKey;
}

/// Whether a queued change creates or updates the remote copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Update,
}

/// A record the user edits locally and the server must be told about.
pub trait Tracked: Record {
    fn sync_meta(&self) -> &SyncMeta;

    fn sync_meta_mut(&mut self) -> &mut SyncMeta;

    /// Wrap this record in the queued change matching `kind`.
    fn into_change(self, kind: ChangeKind) -> PendingChange;

    /// Check field-level rules before the record is saved.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Turn collected validation messages into a single `InvalidInput` error.
pub(crate) fn validation_result(errors: Vec<String>) -> Result<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::InvalidInput(errors.join("; ")))
    }
}
