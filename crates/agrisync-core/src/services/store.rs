//! Durable store shared by the façade and the reconciler.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

use crate::db::{
    Database, LibSqlQueueRepository, LibSqlRecordRepository, QueueRepository, RecordRepository,
};
use crate::models::{ChangeKind, PendingChange, QueueEntry, Record, RecordKey, Tracked};
use crate::{Error, Result};

/// Files SQLite keeps next to the database while it is open.
const JOURNAL_SUFFIXES: [&str; 3] = ["-wal", "-shm", "-journal"];

/// Thread-safe handle over the local database.
///
/// Cloning is cheap; every clone talks to the same connection.
#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl Store {
    /// Open (or create) the store at the given filesystem path.
    pub async fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                Error::StorageUnavailable(format!("{}: {error}", parent.display()))
            })?;
        }

        let db = Self::open_database(&db_path).await?;
        tracing::debug!("Opened local store at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    async fn open_database(db_path: &Path) -> Result<Database> {
        match Database::open(db_path).await {
            Ok(db) => Ok(db),
            Err(error) if Self::looks_unreadable(&error) => {
                tracing::warn!(
                    "Local store at {} is unreadable: {}. Moving it aside and retrying once.",
                    db_path.display(),
                    error
                );
                Self::set_aside_unreadable(db_path)?;
                Database::open(db_path)
                    .await
                    .map_err(|error| Error::StorageUnavailable(error.to_string()))
            }
            Err(error) => Err(Error::StorageUnavailable(error.to_string())),
        }
    }

    fn looks_unreadable(error: &Error) -> bool {
        let message = error.to_string().to_ascii_lowercase();
        message.contains("file is not a database") || message.contains("malformed")
    }

    /// Rename an unreadable database file out of the way and drop its
    /// journal files so the next open starts from an empty store.
    ///
    /// Returns where the old file was moved, `None` if it was already gone.
    fn set_aside_unreadable(db_path: &Path) -> Result<Option<PathBuf>> {
        let name = db_path
            .file_name()
            .map_or_else(|| "agrisync.db".to_string(), |name| name.to_string_lossy().into_owned());

        for suffix in JOURNAL_SUFFIXES {
            let journal = db_path.with_file_name(format!("{name}{suffix}"));
            if journal.is_file() {
                std::fs::remove_file(&journal)?;
                tracing::debug!("Dropped journal file {}", journal.display());
            }
        }

        if !db_path.exists() {
            return Ok(None);
        }
        let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S%3f");
        let kept = db_path.with_file_name(format!("{name}.unreadable-{stamp}"));
        std::fs::rename(db_path, &kept)?;
        tracing::warn!(
            "Kept the unreadable store as {}; records in it are no longer loaded",
            kept.display()
        );
        Ok(Some(kept))
    }

    /// Filesystem path of the database, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Whether both handles share one underlying database.
    pub fn same_instance(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.db, &other.db)
    }

    /// Upsert a record (last write wins).
    pub async fn put<R: Record>(&self, record: &R) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::<R>::new(db.connection());
        repo.put(record).await
    }

    /// Fetch a record by key.
    pub async fn get<R: Record>(&self, key: &RecordKey) -> Result<Option<R>> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::<R>::new(db.connection());
        repo.get(key).await
    }

    /// Every record of a collection.
    pub async fn get_all<R: Record>(&self) -> Result<Vec<R>> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::<R>::new(db.connection());
        repo.list().await
    }

    /// Delete a record, returning whether it existed.
    pub async fn delete<R: Record>(&self, key: &RecordKey) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::<R>::new(db.connection());
        repo.delete(key).await
    }

    /// Append a change to the pending-change queue.
    pub async fn enqueue(&self, change: &PendingChange) -> Result<QueueEntry> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        let entry = repo.enqueue(change).await?;
        tracing::debug!(
            "Queued {} for {} (entry {})",
            change.action(),
            change.record_key(),
            entry.id
        );
        Ok(entry)
    }

    /// Upsert a record and queue the matching change as one unit.
    ///
    /// Create vs update is decided inside the same transaction, so a record
    /// is never stored without its queue entry and two saves of one key
    /// cannot both queue a create.
    pub async fn save_and_enqueue<R: Tracked>(&self, record: &R) -> Result<QueueEntry> {
        let db = self.db.lock().await;
        let conn = db.connection();

        conn.execute("BEGIN TRANSACTION", ()).await?;
        let entry = match Self::write_and_queue(conn, record).await {
            Ok(entry) => entry,
            Err(error) => {
                conn.execute("ROLLBACK", ()).await.ok();
                return Err(error);
            }
        };
        if let Err(error) = conn.execute("COMMIT", ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(error.into());
        }

        tracing::debug!(
            "Queued {} for {} (entry {})",
            entry.change.action(),
            entry.change.record_key(),
            entry.id
        );
        Ok(entry)
    }

    async fn write_and_queue<R: Tracked>(
        conn: &libsql::Connection,
        record: &R,
    ) -> Result<QueueEntry> {
        let records = LibSqlRecordRepository::<R>::new(conn);
        let kind = if records.get(&record.key()).await?.is_some() {
            ChangeKind::Update
        } else {
            ChangeKind::Create
        };
        records.put(record).await?;
        LibSqlQueueRepository::new(conn)
            .enqueue(&record.clone().into_change(kind))
            .await
    }

    /// Non-destructive, ascending-id read of the queue.
    pub async fn queue_snapshot(&self) -> Result<Vec<QueueEntry>> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.snapshot().await
    }

    pub async fn queue_len(&self) -> Result<u64> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.count().await
    }

    /// Remove every queued entry.
    pub async fn clear_queue(&self) -> Result<u64> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.clear().await
    }

    /// Remove queued entries up to and including `max_id`.
    pub async fn clear_queue_through(&self, max_id: i64) -> Result<u64> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.clear_through(max_id).await
    }

    pub async fn remove_queue_entries(&self, ids: &[i64]) -> Result<u64> {
        let db = self.db.lock().await;
        let repo = LibSqlQueueRepository::new(db.connection());
        repo.remove(ids).await
    }

    #[cfg(test)]
    pub(crate) async fn run_sql(&self, sql: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.connection().execute(sql, ()).await?;
        Ok(())
    }

    /// Flag the stored copy as acknowledged by the server.
    ///
    /// Skipped when the stored record was modified after `sent` was queued;
    /// returns whether the flag was written.
    pub async fn mark_synced<R: Tracked>(&self, sent: &R) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::<R>::new(db.connection());

        let Some(mut stored) = repo.get(&sent.key()).await? else {
            return Ok(false);
        };
        if stored.sync_meta().last_modified != sent.sync_meta().last_modified {
            return Ok(false);
        }
        if stored.sync_meta().synced {
            return Ok(true);
        }

        stored.sync_meta_mut().synced = true;
        repo.put(&stored).await?;
        Ok(true)
    }
}

/// Lazily opened store shared by concurrent callers.
///
/// At most one open runs at a time and every caller receives a handle to
/// the same database.
pub struct StoreCell {
    db_path: Option<PathBuf>,
    cell: OnceCell<Store>,
}

impl StoreCell {
    pub const fn new(db_path: PathBuf) -> Self {
        Self {
            db_path: Some(db_path),
            cell: OnceCell::const_new(),
        }
    }

    pub const fn in_memory() -> Self {
        Self {
            db_path: None,
            cell: OnceCell::const_new(),
        }
    }

    /// Open the store on first use; later calls return the same instance.
    pub async fn get_or_open(&self) -> Result<Store> {
        self.cell
            .get_or_try_init(|| async {
                match &self.db_path {
                    Some(path) => Store::open(path.clone()).await,
                    None => Store::open_in_memory().await,
                }
            })
            .await
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Crop, WeatherSnapshot};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn maize() -> Crop {
        Crop::new("Maize", 5.0, "2024-03-15", "Growing", 85).with_id(42)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn in_memory_put_get_delete_roundtrip() {
        let store = Store::open_in_memory().await.unwrap();

        store.put(&maize()).await.unwrap();
        let loaded: Option<Crop> = store.get(&RecordKey::Int(42)).await.unwrap();
        assert_eq!(loaded, Some(maize()));
        assert_eq!(store.get_all::<Crop>().await.unwrap().len(), 1);

        assert!(store.delete::<Crop>(&RecordKey::Int(42)).await.unwrap());
        assert!(store.get_all::<Crop>().await.unwrap().is_empty());
        assert!(store.get_all::<WeatherSnapshot>().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reopening_path_keeps_records_and_queue() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("agrisync.db");

        {
            let store = Store::open(&path).await.unwrap();
            store.put(&maize()).await.unwrap();
            store
                .enqueue(&PendingChange::CreateCrop(maize()))
                .await
                .unwrap();
        }

        let store = Store::open(&path).await.unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        assert_eq!(store.get_all::<Crop>().await.unwrap(), vec![maize()]);
        assert_eq!(store.queue_len().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn save_and_enqueue_picks_create_then_update() {
        let store = Store::open_in_memory().await.unwrap();

        let first = store.save_and_enqueue(&maize()).await.unwrap();
        let second = store.save_and_enqueue(&maize()).await.unwrap();

        assert_eq!(first.change.action(), "create-crop");
        assert_eq!(second.change.action(), "update-crop");
        assert!(second.id > first.id);
        assert_eq!(store.get_all::<Crop>().await.unwrap(), vec![maize()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_enqueue_rolls_back_the_record() {
        let store = Store::open_in_memory().await.unwrap();
        store.run_sql("DROP TABLE pending_sync").await.unwrap();

        let error = store.save_and_enqueue(&maize()).await.unwrap_err();
        assert!(error.is_storage_unavailable());
        assert_eq!(store.get::<Crop>(&RecordKey::Int(42)).await.unwrap(), None);

        store
            .run_sql(
                "CREATE TABLE pending_sync (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    action TEXT NOT NULL,
                    change TEXT NOT NULL,
                    enqueued_at INTEGER NOT NULL
                )",
            )
            .await
            .unwrap();
        let entry = store.save_and_enqueue(&maize()).await.unwrap();
        assert_eq!(entry.change.action(), "create-crop");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_saves_of_one_key_queue_a_single_create() {
        let store = Store::open_in_memory().await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.save_and_enqueue(&maize()).await.unwrap() })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let creates = store
            .queue_snapshot()
            .await
            .unwrap()
            .iter()
            .filter(|entry| entry.change.action() == "create-crop")
            .count();
        assert_eq!(creates, 1);
        assert_eq!(store.queue_len().await.unwrap(), 8);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn clear_queue_empties_without_touching_records() {
        let store = Store::open_in_memory().await.unwrap();
        store.save_and_enqueue(&maize()).await.unwrap();
        store.save_and_enqueue(&maize()).await.unwrap();

        assert_eq!(store.clear_queue().await.unwrap(), 2);
        assert_eq!(store.queue_len().await.unwrap(), 0);
        assert_eq!(store.get_all::<Crop>().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_under_a_regular_file_is_storage_unavailable() {
        let tmp = tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, b"plain file").unwrap();

        let result = Store::open(blocker.join("agrisync.db")).await;
        assert!(matches!(result, Err(Error::StorageUnavailable(_))));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mark_synced_only_for_matching_version() {
        let store = Store::open_in_memory().await.unwrap();
        let mut sent = maize();
        sent.sync.touch();
        store.put(&sent).await.unwrap();

        let mut newer = sent.clone();
        newer.sync.touch();
        store.put(&newer).await.unwrap();

        assert!(!store.mark_synced(&sent).await.unwrap());
        assert!(store.mark_synced(&newer).await.unwrap());

        let stored: Crop = store.get(&RecordKey::Int(42)).await.unwrap().unwrap();
        assert!(stored.sync.synced);
        assert_eq!(stored.sync.last_modified, newer.sync.last_modified);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreadable_file_is_set_aside_and_reopened() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("agrisync.db");
        std::fs::write(&path, vec![b'x'; 8192]).unwrap();

        let store = Store::open(&path).await.unwrap();
        store.put(&maize()).await.unwrap();

        let backups = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(std::result::Result::ok)
            .filter(|entry| {
                entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with("agrisync.db.unreadable-")
            })
            .count();
        assert_eq!(backups, 1);
    }

    #[test]
    fn unreadable_file_is_renamed_and_journals_dropped() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("agrisync.db");
        std::fs::write(&db_path, b"bad-db").unwrap();
        std::fs::write(tmp.path().join("agrisync.db-wal"), b"wal").unwrap();
        std::fs::write(tmp.path().join("agrisync.db-shm"), b"shm").unwrap();
        std::fs::write(tmp.path().join("other.db-wal"), b"keep").unwrap();

        let kept = Store::set_aside_unreadable(&db_path).unwrap().unwrap();

        assert!(!db_path.exists());
        assert_eq!(std::fs::read(&kept).unwrap(), b"bad-db");
        assert!(!tmp.path().join("agrisync.db-wal").exists());
        assert!(!tmp.path().join("agrisync.db-shm").exists());
        assert!(tmp.path().join("other.db-wal").exists());
        assert_eq!(Store::set_aside_unreadable(&db_path).unwrap(), None);
    }

    #[test]
    fn recognises_unreadable_file_errors() {
        assert!(Store::looks_unreadable(&Error::Database(
            "SQLite failure: file is not a database".to_string()
        )));
        assert!(!Store::looks_unreadable(&Error::InvalidInput(
            "crop name is required".to_string()
        )));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn store_cell_resolves_concurrent_callers_to_one_instance() {
        let tmp = tempdir().unwrap();
        let cell = Arc::new(StoreCell::new(tmp.path().join("agrisync.db")));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                tokio::spawn(async move { cell.get_or_open().await.unwrap() })
            })
            .collect();

        let mut stores = Vec::new();
        for handle in handles {
            stores.push(handle.await.unwrap());
        }
        assert!(stores.iter().all(|store| store.same_instance(&stores[0])));
    }
}
