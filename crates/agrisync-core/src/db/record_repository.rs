//! Record repository implementation

use std::marker::PhantomData;

use crate::error::Result;
use crate::models::{Record, RecordKey};
use crate::util::now_millis;
use libsql::{params, Connection};

/// Trait for per-collection record storage (async)
#[allow(async_fn_in_trait)]
pub trait RecordRepository<R: Record> {
    /// Insert or replace a record by its key (last write wins)
    async fn put(&self, record: &R) -> Result<()>;

    /// Get a record by key
    async fn get(&self, key: &RecordKey) -> Result<Option<R>>;

    /// List every record, numeric keys ascending
    async fn list(&self) -> Result<Vec<R>>;

    /// Delete a record; returns whether a row was removed
    async fn delete(&self, key: &RecordKey) -> Result<bool>;

    /// Number of stored records
    async fn count(&self) -> Result<u64>;
}

/// libSQL implementation of `RecordRepository`, one JSON body per row
pub struct LibSqlRecordRepository<'a, R> {
    conn: &'a Connection,
    _record: PhantomData<R>,
}

impl<'a, R: Record> LibSqlRecordRepository<'a, R> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            _record: PhantomData,
        }
    }

    const fn table() -> &'static str {
        R::COLLECTION.table()
    }
}

impl<R: Record> RecordRepository<R> for LibSqlRecordRepository<'_, R> {
    async fn put(&self, record: &R) -> Result<()> {
        let body = serde_json::to_string(record)?;
        let sql = format!(
            "INSERT INTO {} (id, body, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
            Self::table()
        );
        self.conn
            .execute(&sql, params![record.key().to_string(), body, now_millis()])
            .await?;
        Ok(())
    }

    async fn get(&self, key: &RecordKey) -> Result<Option<R>> {
        let sql = format!("SELECT body FROM {} WHERE id = ?", Self::table());
        let mut rows = self.conn.query(&sql, [key.to_string()]).await?;

        if let Some(row) = rows.next().await? {
            let body: String = row.get(0)?;
            Ok(Some(serde_json::from_str(&body)?))
        } else {
            Ok(None)
        }
    }

    async fn list(&self) -> Result<Vec<R>> {
        let sql = format!(
            "SELECT body FROM {} ORDER BY CAST(id AS INTEGER), id",
            Self::table()
        );
        let mut rows = self.conn.query(&sql, ()).await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            let body: String = row.get(0)?;
            records.push(serde_json::from_str(&body)?);
        }
        Ok(records)
    }

    async fn delete(&self, key: &RecordKey) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?", Self::table());
        let removed = self.conn.execute(&sql, [key.to_string()]).await?;
        Ok(removed > 0)
    }

    async fn count(&self) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", Self::table());
        let mut rows = self.conn.query(&sql, ()).await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<u64>(0)?,
            None => 0,
        };
        Ok(count)
    }
}
