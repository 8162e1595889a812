//! Farm activity log entry

use serde::{Deserialize, Serialize};

use super::record::{validation_result, ChangeKind, Collection, Record, RecordKey, SyncMeta, Tracked};
use super::PendingChange;
use crate::error::Result;
use crate::util::{next_record_id, parse_past_date};

/// Something done on the farm, optionally with a cost or an income
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: i64,
    /// Day of the activity (`YYYY-MM-DD`)
    pub date: String,
    /// Free-text description
    pub activity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income: Option<f64>,
    #[serde(flatten)]
    pub sync: SyncMeta,
}

impl Activity {
    pub fn new(date: impl Into<String>, activity: impl Into<String>) -> Self {
        Self {
            id: next_record_id(),
            date: date.into(),
            activity: activity.into(),
            cost: None,
            income: None,
            sync: SyncMeta::default(),
        }
    }

    #[must_use]
    pub const fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    #[must_use]
    pub const fn with_income(mut self, income: f64) -> Self {
        self.income = Some(income);
        self
    }

    #[must_use]
    pub const fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }
}

impl Record for Activity {
    const COLLECTION: Collection = Collection::Activities;

    fn key(&self) -> RecordKey {
        RecordKey::Int(self.id)
    }
}

impl Tracked for Activity {
    fn sync_meta(&self) -> &SyncMeta {
        &self.sync
    }

    fn sync_meta_mut(&mut self) -> &mut SyncMeta {
        &mut self.sync
    }

    fn into_change(self, kind: ChangeKind) -> PendingChange {
        match kind {
            ChangeKind::Create => PendingChange::CreateActivity(self),
            ChangeKind::Update => PendingChange::UpdateActivity(self),
        }
    }

    fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.activity.trim().is_empty() {
            errors.push("Activity description is required".to_string());
        }
        if let Err(error) = parse_past_date(&self.date) {
            errors.push(format!("Invalid activity date: {error}"));
        }
        if self.cost.is_some_and(|cost| cost < 0.0) {
            errors.push("Cost cannot be negative".to_string());
        }
        if self.income.is_some_and(|income| income < 0.0) {
            errors.push("Income cannot be negative".to_string());
        }

        validation_result(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn omits_absent_amounts() {
        let activity = Activity::new("2024-06-28", "Applied fertilizer to maize field")
            .with_cost(15_000.0)
            .with_id(1);
        let value = serde_json::to_value(&activity).unwrap();
        assert_eq!(value["cost"], 15_000.0);
        assert!(value.get("income").is_none());
    }

    #[test]
    fn validate_rejects_negative_cost() {
        let activity = Activity::new("2024-06-22", "Vet visit").with_cost(-1.0);
        assert!(activity.validate().is_err());
    }
}
