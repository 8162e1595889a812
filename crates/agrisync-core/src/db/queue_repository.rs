//! Pending-change queue repository implementation

use crate::error::{Error, Result};
use crate::models::{PendingChange, QueueEntry};
use crate::util::now_millis;
use libsql::{params, Connection};

/// Trait for the append-only change queue (async)
#[allow(async_fn_in_trait)]
pub trait QueueRepository {
    /// Append a change, returning the stored entry with its assigned id
    async fn enqueue(&self, change: &PendingChange) -> Result<QueueEntry>;

    /// Every entry in ascending id order, without removing anything
    async fn snapshot(&self) -> Result<Vec<QueueEntry>>;

    /// Number of queued entries
    async fn count(&self) -> Result<u64>;

    /// Remove all entries
    async fn clear(&self) -> Result<u64>;

    /// Remove entries with `id <= max_id`
    async fn clear_through(&self, max_id: i64) -> Result<u64>;

    /// Remove the given entries
    async fn remove(&self, ids: &[i64]) -> Result<u64>;
}

/// libSQL implementation of `QueueRepository`
pub struct LibSqlQueueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlQueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_entry(row: &libsql::Row) -> Result<QueueEntry> {
        let id: i64 = row.get(0)?;
        let change: String = row.get(1)?;
        let enqueued_at: i64 = row.get(2)?;
        let change: PendingChange = serde_json::from_str(&change).map_err(|error| {
            Error::Database(format!("queue entry {id} has an unreadable change: {error}"))
        })?;
        Ok(QueueEntry {
            id,
            change,
            enqueued_at,
        })
    }
}

impl QueueRepository for LibSqlQueueRepository<'_> {
    async fn enqueue(&self, change: &PendingChange) -> Result<QueueEntry> {
        let body = serde_json::to_string(change)?;
        let enqueued_at = now_millis();

        self.conn
            .execute(
                "INSERT INTO pending_sync (action, change, enqueued_at) VALUES (?, ?, ?)",
                params![change.action(), body, enqueued_at],
            )
            .await?;

        Ok(QueueEntry {
            id: self.conn.last_insert_rowid(),
            change: change.clone(),
            enqueued_at,
        })
    }

    async fn snapshot(&self) -> Result<Vec<QueueEntry>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, change, enqueued_at FROM pending_sync ORDER BY id ASC",
                (),
            )
            .await?;

        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(Self::parse_entry(&row)?);
        }
        Ok(entries)
    }

    async fn count(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM pending_sync", ())
            .await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<u64>(0)?,
            None => 0,
        };
        Ok(count)
    }

    async fn clear(&self) -> Result<u64> {
        let removed = self.conn.execute("DELETE FROM pending_sync", ()).await?;
        Ok(removed)
    }

    async fn clear_through(&self, max_id: i64) -> Result<u64> {
        let removed = self
            .conn
            .execute("DELETE FROM pending_sync WHERE id <= ?", [max_id])
            .await?;
        Ok(removed)
    }

    async fn remove(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let list = ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("DELETE FROM pending_sync WHERE id IN ({list})");
        let removed = self.conn.execute(&sql, ()).await?;
        Ok(removed)
    }
}
