//! In-memory copy of the records clients have pushed.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use agrisync_core::models::Collection;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::AppError;

/// Collections clients may write to
const WRITABLE: [Collection; 4] = [
    Collection::Crops,
    Collection::Livestock,
    Collection::Activities,
    Collection::Transactions,
];

pub fn writable_collection(resource: &str) -> Result<Collection, AppError> {
    resource
        .parse::<Collection>()
        .ok()
        .filter(|collection| WRITABLE.contains(collection))
        .ok_or_else(|| AppError::not_found(format!("unknown resource '{resource}'")))
}

#[derive(Clone, Default)]
pub struct RecordBook {
    inner: Arc<RwLock<HashMap<Collection, BTreeMap<String, Value>>>>,
}

impl RecordBook {
    /// Store a new record. Replaying a create replaces the stored copy.
    pub async fn create(&self, collection: Collection, body: Value) -> Result<Value, AppError> {
        let id = record_id(&body)?;
        let mut guard = self.inner.write().await;
        let replaced = guard
            .entry(collection)
            .or_default()
            .insert(id.clone(), body.clone())
            .is_some();
        if replaced {
            tracing::debug!("Create for existing {collection} {id} replaced the stored copy");
        }
        Ok(body)
    }

    /// Replace a record, inserting it when the create never arrived.
    pub async fn update(
        &self,
        collection: Collection,
        id: &str,
        body: Value,
    ) -> Result<Value, AppError> {
        let body_id = record_id(&body)?;
        if body_id != id {
            return Err(AppError::bad_request(format!(
                "body id {body_id} does not match path id {id}"
            )));
        }

        self.inner
            .write()
            .await
            .entry(collection)
            .or_default()
            .insert(body_id, body.clone());
        Ok(body)
    }

    pub async fn list(&self, collection: Collection) -> Vec<Value> {
        self.inner
            .read()
            .await
            .get(&collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn total(&self) -> usize {
        self.inner.read().await.values().map(BTreeMap::len).sum()
    }
}

fn record_id(body: &Value) -> Result<String, AppError> {
    let object = body
        .as_object()
        .ok_or_else(|| AppError::bad_request("record body must be a JSON object"))?;
    match object.get("id") {
        Some(Value::Number(id)) => Ok(id.to_string()),
        Some(Value::String(id)) if !id.trim().is_empty() => Ok(id.trim().to_string()),
        _ => Err(AppError::bad_request("record body needs an id")),
    }
}
