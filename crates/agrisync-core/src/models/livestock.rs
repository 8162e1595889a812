//! Livestock model

use serde::{Deserialize, Serialize};

use super::record::{validation_result, ChangeKind, Collection, Record, RecordKey, SyncMeta, Tracked};
use super::PendingChange;
use crate::error::Result;
use crate::util::{next_record_id, parse_past_date};

/// A group of animals of one kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Livestock {
    pub id: i64,
    /// Animal kind, e.g. "Cattle"
    #[serde(rename = "type")]
    pub kind: String,
    /// Head count
    pub count: u32,
    /// Last veterinary checkup (`YYYY-MM-DD`), empty when unknown
    #[serde(default)]
    pub last_checkup: String,
    /// Health label, e.g. "Good"
    pub health: String,
    #[serde(flatten)]
    pub sync: SyncMeta,
}

impl Livestock {
    pub fn new(
        kind: impl Into<String>,
        count: u32,
        last_checkup: impl Into<String>,
        health: impl Into<String>,
    ) -> Self {
        Self {
            id: next_record_id(),
            kind: kind.into(),
            count,
            last_checkup: last_checkup.into(),
            health: health.into(),
            sync: SyncMeta::default(),
        }
    }

    #[must_use]
    pub const fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }
}

impl Record for Livestock {
    const COLLECTION: Collection = Collection::Livestock;

    fn key(&self) -> RecordKey {
        RecordKey::Int(self.id)
    }
}

impl Tracked for Livestock {
    fn sync_meta(&self) -> &SyncMeta {
        &self.sync
    }

    fn sync_meta_mut(&mut self) -> &mut SyncMeta {
        &mut self.sync
    }

    fn into_change(self, kind: ChangeKind) -> PendingChange {
        match kind {
            ChangeKind::Create => PendingChange::CreateLivestock(self),
            ChangeKind::Update => PendingChange::UpdateLivestock(self),
        }
    }

    fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.kind.trim().is_empty() {
            errors.push("Livestock type is required".to_string());
        }
        if self.count == 0 {
            errors.push("Livestock count must be greater than 0".to_string());
        }
        if !self.last_checkup.trim().is_empty() {
            if let Err(error) = parse_past_date(&self.last_checkup) {
                errors.push(format!("Invalid last checkup date: {error}"));
            }
        }

        validation_result(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_as_type() {
        let cattle = Livestock::new("Cattle", 15, "2024-06-20", "Good").with_id(1);
        let value = serde_json::to_value(&cattle).unwrap();
        assert_eq!(value["type"], "Cattle");
        assert_eq!(value["lastCheckup"], "2024-06-20");
    }

    #[test]
    fn validate_requires_positive_count() {
        let goats = Livestock::new("Goats", 0, "", "Fair");
        let message = goats.validate().unwrap_err().to_string();
        assert!(message.contains("count must be greater than 0"));
        assert!(Livestock::new("Goats", 8, "", "Fair").validate().is_ok());
    }
}
