//! Queued mutations waiting to be replayed against the remote service

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::record::{ChangeKind, Collection, Record, RecordKey};
use super::{Activity, Crop, Livestock, Transaction};
use crate::error::Result;

/// One local mutation the server has not acknowledged yet.
///
/// Serialized as `{"action": "create-crop", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "kebab-case")]
pub enum PendingChange {
    CreateCrop(Crop),
    UpdateCrop(Crop),
    CreateLivestock(Livestock),
    UpdateLivestock(Livestock),
    CreateActivity(Activity),
    UpdateActivity(Activity),
    CreateTransaction(Transaction),
    UpdateTransaction(Transaction),
}

impl PendingChange {
    /// Action tag as stored in the queue, e.g. `create-crop`
    pub const fn action(&self) -> &'static str {
        match self {
            Self::CreateCrop(_) => "create-crop",
            Self::UpdateCrop(_) => "update-crop",
            Self::CreateLivestock(_) => "create-livestock",
            Self::UpdateLivestock(_) => "update-livestock",
            Self::CreateActivity(_) => "create-activity",
            Self::UpdateActivity(_) => "update-activity",
            Self::CreateTransaction(_) => "create-transaction",
            Self::UpdateTransaction(_) => "update-transaction",
        }
    }

    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::CreateCrop(_)
            | Self::CreateLivestock(_)
            | Self::CreateActivity(_)
            | Self::CreateTransaction(_) => ChangeKind::Create,
            Self::UpdateCrop(_)
            | Self::UpdateLivestock(_)
            | Self::UpdateActivity(_)
            | Self::UpdateTransaction(_) => ChangeKind::Update,
        }
    }

    pub const fn collection(&self) -> Collection {
        match self {
            Self::CreateCrop(_) | Self::UpdateCrop(_) => Collection::Crops,
            Self::CreateLivestock(_) | Self::UpdateLivestock(_) => Collection::Livestock,
            Self::CreateActivity(_) | Self::UpdateActivity(_) => Collection::Activities,
            Self::CreateTransaction(_) | Self::UpdateTransaction(_) => Collection::Transactions,
        }
    }

    /// Identifier of the record this change targets
    pub fn record_key(&self) -> RecordKey {
        match self {
            Self::CreateCrop(crop) | Self::UpdateCrop(crop) => crop.key(),
            Self::CreateLivestock(livestock) | Self::UpdateLivestock(livestock) => livestock.key(),
            Self::CreateActivity(activity) | Self::UpdateActivity(activity) => activity.key(),
            Self::CreateTransaction(tx) | Self::UpdateTransaction(tx) => tx.key(),
        }
    }

    /// The record as the JSON body sent to the server
    pub fn payload(&self) -> Result<Value> {
        let value = match self {
            Self::CreateCrop(crop) | Self::UpdateCrop(crop) => serde_json::to_value(crop)?,
            Self::CreateLivestock(livestock) | Self::UpdateLivestock(livestock) => {
                serde_json::to_value(livestock)?
            }
            Self::CreateActivity(activity) | Self::UpdateActivity(activity) => {
                serde_json::to_value(activity)?
            }
            Self::CreateTransaction(tx) | Self::UpdateTransaction(tx) => serde_json::to_value(tx)?,
        };
        Ok(value)
    }
}

/// A durable queue row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    /// Auto-incremented sequence number, strictly increasing
    pub id: i64,
    #[serde(flatten)]
    pub change: PendingChange,
    /// When the entry was appended (Unix ms)
    pub enqueued_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncMeta;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn maize() -> Crop {
        Crop {
            id: 42,
            name: "Maize".into(),
            area: 5.0,
            plant_date: "2024-03-15".into(),
            status: "Growing".into(),
            health: 85,
            sync: SyncMeta::default(),
        }
    }

    #[test]
    fn serializes_action_and_payload() {
        let change = PendingChange::CreateCrop(maize());
        let value = serde_json::to_value(&change).unwrap();

        assert_eq!(value["action"], "create-crop");
        assert_eq!(value["action"], change.action());
        assert_eq!(value["payload"]["id"], 42);
        assert_eq!(value["payload"]["name"], "Maize");
    }

    #[test]
    fn queue_entry_flattens_change() {
        let entry = QueueEntry {
            id: 3,
            change: PendingChange::UpdateCrop(maize()),
            enqueued_at: 99,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["id"], 3);
        assert_eq!(value["action"], "update-crop");
        assert_eq!(value["enqueuedAt"], 99);

        let parsed: QueueEntry = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn unknown_action_is_rejected() {
        let result = serde_json::from_value::<PendingChange>(json!({
            "action": "delete-crop",
            "payload": {}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn describes_target_record() {
        let change = PendingChange::UpdateCrop(maize());
        assert_eq!(change.kind(), ChangeKind::Update);
        assert_eq!(change.collection(), Collection::Crops);
        assert_eq!(change.record_key(), RecordKey::Int(42));
        assert_eq!(change.payload().unwrap()["area"], 5.0);
    }
}
