//! Crop model

use serde::{Deserialize, Serialize};

use super::record::{validation_result, ChangeKind, Collection, Record, RecordKey, SyncMeta, Tracked};
use super::PendingChange;
use crate::error::Result;
use crate::util::{next_record_id, parse_past_date};

/// A planted crop on the farm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Crop {
    /// Identifier (caller-assigned or timestamp-derived)
    pub id: i64,
    /// Crop name, e.g. "Maize"
    pub name: String,
    /// Planted area in acres
    pub area: f64,
    /// Planting date (`YYYY-MM-DD`)
    pub plant_date: String,
    /// Growth stage label, e.g. "Growing"
    pub status: String,
    /// Health score (0-100)
    pub health: u32,
    #[serde(flatten)]
    pub sync: SyncMeta,
}

impl Crop {
    /// Create a crop with a timestamp-derived id
    pub fn new(
        name: impl Into<String>,
        area: f64,
        plant_date: impl Into<String>,
        status: impl Into<String>,
        health: u32,
    ) -> Self {
        Self {
            id: next_record_id(),
            name: name.into(),
            area,
            plant_date: plant_date.into(),
            status: status.into(),
            health,
            sync: SyncMeta::default(),
        }
    }

    /// Replace the generated id
    #[must_use]
    pub const fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }
}

impl Record for Crop {
    const COLLECTION: Collection = Collection::Crops;

    fn key(&self) -> RecordKey {
        RecordKey::Int(self.id)
    }
}

impl Tracked for Crop {
    fn sync_meta(&self) -> &SyncMeta {
        &self.sync
    }

    fn sync_meta_mut(&mut self) -> &mut SyncMeta {
        &mut self.sync
    }

    fn into_change(self, kind: ChangeKind) -> PendingChange {
        match kind {
            ChangeKind::Create => PendingChange::CreateCrop(self),
            ChangeKind::Update => PendingChange::UpdateCrop(self),
        }
    }

    fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("Crop name is required".to_string());
        }
        if self.area.is_nan() || self.area <= 0.0 {
            errors.push("Crop area must be greater than 0".to_string());
        }
        if self.plant_date.trim().is_empty() {
            errors.push("Plant date is required".to_string());
        } else if let Err(error) = parse_past_date(&self.plant_date) {
            errors.push(format!("Invalid plant date: {error}"));
        }
        if self.health > 100 {
            errors.push("Health score must be between 0 and 100".to_string());
        }

        validation_result(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn serializes_with_camel_case_sync_fields() {
        let crop = Crop {
            id: 42,
            name: "Maize".into(),
            area: 5.0,
            plant_date: "2024-03-15".into(),
            status: "Growing".into(),
            health: 85,
            sync: SyncMeta {
                last_modified: 1_700_000_000_000,
                synced: false,
            },
        };

        let value = serde_json::to_value(&crop).unwrap();
        assert_eq!(value["plantDate"], "2024-03-15");
        assert_eq!(value["lastModified"], 1_700_000_000_000_i64);
        assert_eq!(value["synced"], false);

        let parsed: Crop = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, crop);
    }

    #[test]
    fn validate_collects_every_problem() {
        let crop = Crop::new(" ", 0.0, "2999-01-01", "Growing", 120);
        let message = crop.validate().unwrap_err().to_string();
        assert!(message.contains("name is required"));
        assert!(message.contains("area must be greater than 0"));
        assert!(message.contains("future"));
        assert!(message.contains("between 0 and 100"));
    }

    #[test]
    fn validate_accepts_reasonable_crop() {
        let crop = Crop::new("Beans", 2.0, "2024-04-01", "Flowering", 92);
        assert!(crop.validate().is_ok());
    }
}
