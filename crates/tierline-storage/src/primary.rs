//! Primary Store Boundary
//!
//! The primary store proper (its query engine, replication, and
//! provisioning) is an external collaborator; this module defines the
//! seam the tiering layer needs from it: point reads and writes,
//! idempotent deletes, and a stable paged scan of old records.
//!
//! Two implementations are provided:
//!
//! - [`SqlitePrimaryStore`]: a reference single-node backend, enough to
//!   run the whole tiering loop locally (used by `tierctl`).
//! - [`MemoryPrimaryStore`]: an in-memory backend with read-failure
//!   injection for fault testing.
//!
//! ## Scan Contract
//!
//! `scan_older_than` pages through records with `timestamp` strictly
//! below the threshold, ordered by `(partition_key, record_id)`. The
//! ordering is total and stable, so a cursor taken from the last record
//! of a page resumes the scan without gaps or repeats even across
//! process restarts.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tierline_core::Record;
use tierline_index::Cursor;
use tokio::sync::RwLock;

use crate::error::{Error, Result};

/// Low-latency store holding hot records.
#[async_trait]
pub trait PrimaryStore: Send + Sync {
    /// Point read by record identifier.
    async fn get(&self, record_id: &str) -> Result<Option<Record>>;

    /// Insert or overwrite a record. Writes always land here; tiering
    /// is transparent to writers.
    async fn put(&self, record: Record) -> Result<()>;

    /// Delete a record. Deleting an absent record is success, because a
    /// prior migration run may already have completed this step.
    async fn delete(&self, record_id: &str) -> Result<()>;

    /// Page through records with `timestamp < threshold_ms`, ordered by
    /// `(partition_key, record_id)`, starting strictly after `after`.
    async fn scan_older_than(
        &self,
        threshold_ms: i64,
        after: Option<&Cursor>,
        limit: usize,
    ) -> Result<Vec<Record>>;
}

/// In-memory [`PrimaryStore`] used by tests and local experiments.
pub struct MemoryPrimaryStore {
    inner: RwLock<MemoryInner>,
    fail_reads: AtomicBool,
}

#[derive(Default)]
struct MemoryInner {
    // Keyed by (partition_key, record_id) to get the scan order for free.
    by_scan_key: BTreeMap<(String, String), Record>,
    partition_of: HashMap<String, String>,
}

impl MemoryPrimaryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryInner::default()),
            fail_reads: AtomicBool::new(false),
        }
    }

    /// Make subsequent `get` calls fail with `PrimaryUnavailable`.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.inner.read().await.by_scan_key.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryPrimaryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrimaryStore for MemoryPrimaryStore {
    async fn get(&self, record_id: &str) -> Result<Option<Record>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::PrimaryUnavailable("injected read failure".to_string()));
        }

        let inner = self.inner.read().await;
        let Some(partition_key) = inner.partition_of.get(record_id) else {
            return Ok(None);
        };
        Ok(inner
            .by_scan_key
            .get(&(partition_key.clone(), record_id.to_string()))
            .cloned())
    }

    async fn put(&self, record: Record) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .partition_of
            .insert(record.id.clone(), record.partition_key.clone());
        inner
            .by_scan_key
            .insert((record.partition_key.clone(), record.id.clone()), record);
        Ok(())
    }

    async fn delete(&self, record_id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(partition_key) = inner.partition_of.remove(record_id) {
            inner
                .by_scan_key
                .remove(&(partition_key, record_id.to_string()));
        }
        Ok(())
    }

    async fn scan_older_than(
        &self,
        threshold_ms: i64,
        after: Option<&Cursor>,
        limit: usize,
    ) -> Result<Vec<Record>> {
        let inner = self.inner.read().await;

        let start = after.map(|c| (c.partition_key.clone(), c.record_id.clone()));
        let records = inner
            .by_scan_key
            .iter()
            .filter(|(key, _)| match &start {
                Some(start) => *key > start,
                None => true,
            })
            .map(|(_, record)| record)
            .filter(|record| record.timestamp < threshold_ms)
            .take(limit)
            .cloned()
            .collect();

        Ok(records)
    }
}

/// SQLite-backed reference [`PrimaryStore`].
pub struct SqlitePrimaryStore {
    pool: SqlitePool,
}

impl SqlitePrimaryStore {
    /// Open (or create) a file-backed primary store.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}", path.as_ref().display()))?
                .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| Error::PrimaryUnavailable(e.to_string()))?;

        Ok(Self { pool })
    }

    fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Record> {
        let payload: Vec<u8> = row.try_get("payload")?;
        Ok(Record {
            id: row.try_get("record_id")?,
            partition_key: row.try_get("partition_key")?,
            timestamp: row.try_get("timestamp")?,
            payload: Bytes::from(payload),
        })
    }
}

#[async_trait]
impl PrimaryStore for SqlitePrimaryStore {
    async fn get(&self, record_id: &str) -> Result<Option<Record>> {
        let row = sqlx::query(
            "SELECT record_id, partition_key, timestamp, payload FROM primary_records WHERE record_id = ?",
        )
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Self::record_from_row(&row)).transpose()
    }

    async fn put(&self, record: Record) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO primary_records (record_id, partition_key, timestamp, payload)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.partition_key)
        .bind(record.timestamp)
        .bind(record.payload.as_ref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, record_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM primary_records WHERE record_id = ?")
            .bind(record_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn scan_older_than(
        &self,
        threshold_ms: i64,
        after: Option<&Cursor>,
        limit: usize,
    ) -> Result<Vec<Record>> {
        let rows = match after {
            Some(cursor) => {
                sqlx::query(
                    r#"
                    SELECT record_id, partition_key, timestamp, payload
                    FROM primary_records
                    WHERE timestamp < ? AND (partition_key, record_id) > (?, ?)
                    ORDER BY partition_key, record_id
                    LIMIT ?
                    "#,
                )
                .bind(threshold_ms)
                .bind(&cursor.partition_key)
                .bind(&cursor.record_id)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT record_id, partition_key, timestamp, payload
                    FROM primary_records
                    WHERE timestamp < ?
                    ORDER BY partition_key, record_id
                    LIMIT ?
                    "#,
                )
                .bind(threshold_ms)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(Self::record_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, partition: &str, timestamp: i64) -> Record {
        Record::new(id, partition, timestamp, Bytes::from(format!("payload-{id}")))
    }

    // ----------------------------------------------------------------
    // MemoryPrimaryStore
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn test_memory_put_get_delete() {
        let store = MemoryPrimaryStore::new();

        store.put(record("r1", "p1", 100)).await.unwrap();
        let fetched = store.get("r1").await.unwrap().unwrap();
        assert_eq!(fetched.payload, Bytes::from("payload-r1"));

        store.delete("r1").await.unwrap();
        assert!(store.get("r1").await.unwrap().is_none());

        // Deleting an absent record is success
        store.delete("r1").await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_scan_order_and_threshold() {
        let store = MemoryPrimaryStore::new();

        store.put(record("r2", "pB", 10)).await.unwrap();
        store.put(record("r1", "pA", 10)).await.unwrap();
        store.put(record("r3", "pA", 999)).await.unwrap();

        let page = store.scan_older_than(100, None, 10).await.unwrap();
        let ids: Vec<&str> = page.iter().map(|r| r.id.as_str()).collect();
        // Ordered by (partition_key, record_id); r3 filtered by threshold
        assert_eq!(ids, vec!["r1", "r2"]);
    }

    #[tokio::test]
    async fn test_memory_scan_cursor_paging() {
        let store = MemoryPrimaryStore::new();
        for i in 0..5 {
            store.put(record(&format!("r{i}"), "p", 10)).await.unwrap();
        }

        let first = store.scan_older_than(100, None, 2).await.unwrap();
        assert_eq!(first.len(), 2);

        let cursor = Cursor {
            partition_key: first[1].partition_key.clone(),
            record_id: first[1].id.clone(),
        };
        let second = store.scan_older_than(100, Some(&cursor), 10).await.unwrap();
        assert_eq!(second.len(), 3);
        assert_eq!(second[0].id, "r2");
    }

    #[tokio::test]
    async fn test_memory_fail_reads() {
        let store = MemoryPrimaryStore::new();
        store.put(record("r1", "p", 10)).await.unwrap();

        store.set_fail_reads(true);
        assert!(matches!(
            store.get("r1").await.unwrap_err(),
            Error::PrimaryUnavailable(_)
        ));

        store.set_fail_reads(false);
        assert!(store.get("r1").await.unwrap().is_some());
    }

    // ----------------------------------------------------------------
    // SqlitePrimaryStore
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn test_sqlite_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqlitePrimaryStore::new(dir.path().join("primary.db"))
            .await
            .unwrap();

        store.put(record("r1", "p1", 100)).await.unwrap();
        let fetched = store.get("r1").await.unwrap().unwrap();
        assert_eq!(fetched.partition_key, "p1");
        assert_eq!(fetched.payload, Bytes::from("payload-r1"));

        store.delete("r1").await.unwrap();
        assert!(store.get("r1").await.unwrap().is_none());
        store.delete("r1").await.unwrap();
    }

    #[tokio::test]
    async fn test_sqlite_scan_matches_memory_semantics() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqlitePrimaryStore::new(dir.path().join("primary.db"))
            .await
            .unwrap();

        store.put(record("r2", "pB", 10)).await.unwrap();
        store.put(record("r1", "pA", 10)).await.unwrap();
        store.put(record("r3", "pA", 999)).await.unwrap();

        let page = store.scan_older_than(100, None, 1).await.unwrap();
        assert_eq!(page[0].id, "r1");

        let cursor = Cursor {
            partition_key: "pA".to_string(),
            record_id: "r1".to_string(),
        };
        let rest = store.scan_older_than(100, Some(&cursor), 10).await.unwrap();
        let ids: Vec<&str> = rest.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r2"]);
    }
}
