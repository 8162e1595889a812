//! Money movement recorded after a payment

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::record::{ChangeKind, Collection, Record, RecordKey, SyncMeta, Tracked};
use super::PendingChange;
use crate::error::Error;
use crate::util::next_record_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Credit => f.write_str("credit"),
            Self::Debit => f.write_str("debit"),
        }
    }
}

impl FromStr for TransactionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "credit" => Ok(Self::Credit),
            "debit" => Ok(Self::Debit),
            other => Err(Error::InvalidInput(format!(
                "transaction type must be credit or debit, got '{other}'"
            ))),
        }
    }
}

/// A credit or debit; callers hand these over already validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    pub description: String,
    /// Booking date (`YYYY-MM-DD`)
    pub date: String,
    /// Payment method, e.g. "M-Pesa"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(flatten)]
    pub sync: SyncMeta,
}

impl Transaction {
    pub fn new(
        kind: TransactionKind,
        amount: f64,
        description: impl Into<String>,
        date: impl Into<String>,
    ) -> Self {
        Self {
            id: next_record_id(),
            kind,
            amount,
            description: description.into(),
            date: date.into(),
            method: None,
            sync: SyncMeta::default(),
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }
}

impl Record for Transaction {
    const COLLECTION: Collection = Collection::Transactions;

    fn key(&self) -> RecordKey {
        RecordKey::Int(self.id)
    }
}

impl Tracked for Transaction {
    fn sync_meta(&self) -> &SyncMeta {
        &self.sync
    }

    fn sync_meta_mut(&mut self) -> &mut SyncMeta {
        &mut self.sync
    }

    fn into_change(self, kind: ChangeKind) -> PendingChange {
        match kind {
            ChangeKind::Create => PendingChange::CreateTransaction(self),
            ChangeKind::Update => PendingChange::UpdateTransaction(self),
        }
    }
}
