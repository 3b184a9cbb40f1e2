//! SQLite Location Index Implementation
//!
//! Implements the [`LocationIndex`] trait over SQLite via sqlx.
//!
//! ## What Does This Store?
//!
//! - **Index entries**: record identifier → tier + archive path. This
//!   is the single source of truth for read routing; it must be durable
//!   before the orchestrator is allowed to delete a record from the
//!   primary store.
//! - **Migration checkpoints**: the scan cursor persisted after each
//!   page, so a crashed run resumes instead of rescanning.
//! - **Leases**: orchestrator mutual exclusion with expiry-based
//!   reclaim.
//!
//! ## Concurrency
//!
//! `record_migrated` and `acquire_lease` are single conditional
//! statements, so concurrent callers race safely inside SQLite: exactly
//! one worker observes `Recorded` for a record, and exactly one holder
//! wins a contended lease.
//!
//! ## Usage
//!
//! ```ignore
//! let index = SqliteLocationIndex::new("tierline-index.db").await?;
//! match index.lookup("order-42").await? {
//!     Some(entry) => println!("{} is {}", entry.record_id, entry.tier),
//!     None => println!("no entry, assume hot"),
//! }
//! ```

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tierline_core::Tier;
use tracing::debug;

use crate::error::{IndexError, Result};
use crate::types::{Cursor, IndexEntry, Lease, MigrationCheckpoint, MigrationMark};

/// Durable mapping from record identifier to current tier and archive
/// path, plus the orchestrator's persisted state (checkpoints, leases).
#[async_trait]
pub trait LocationIndex: Send + Sync {
    /// Look up the current location of a record.
    ///
    /// `None` means the index has never seen the record: callers assume
    /// hot, or reconstruct the archive path deterministically.
    async fn lookup(&self, record_id: &str) -> Result<Option<IndexEntry>>;

    /// Record a completed hot→cold migration.
    ///
    /// Idempotent: the first call transitions the entry and returns
    /// [`MigrationMark::Recorded`]; any later call for the same record
    /// returns [`MigrationMark::AlreadyCold`]. Entries never revert
    /// cold→hot.
    async fn record_migrated(
        &self,
        record_id: &str,
        archive_path: &str,
        updated_at: i64,
    ) -> Result<MigrationMark>;

    /// Persist scan progress for a job. Overwrites any prior checkpoint.
    async fn save_checkpoint(&self, checkpoint: &MigrationCheckpoint) -> Result<()>;

    /// Load the persisted scan position for a job, if any.
    async fn load_checkpoint(&self, job_id: &str) -> Result<Option<MigrationCheckpoint>>;

    /// Remove the checkpoint after a fully completed scan.
    async fn clear_checkpoint(&self, job_id: &str) -> Result<()>;

    /// Acquire (or re-acquire) the run lease for a job.
    ///
    /// Succeeds when no lease exists, the caller already holds it, or
    /// the existing lease has expired; the epoch increments on every
    /// successful acquire. Fails with [`IndexError::LeaseHeld`] while a
    /// live lease belongs to another holder.
    async fn acquire_lease(&self, job_id: &str, holder_id: &str, ttl_ms: i64) -> Result<Lease>;

    /// Extend a held lease. Fails with [`IndexError::LeaseNotHeld`] if
    /// the caller no longer holds it.
    async fn renew_lease(&self, job_id: &str, holder_id: &str, ttl_ms: i64) -> Result<Lease>;

    /// Release a held lease. Releasing a lease that is not held is a
    /// no-op so shutdown paths can call it unconditionally.
    async fn release_lease(&self, job_id: &str, holder_id: &str) -> Result<()>;
}

/// SQLite-backed [`LocationIndex`].
pub struct SqliteLocationIndex {
    pool: SqlitePool,
}

impl SqliteLocationIndex {
    /// Open (or create) a file-backed index database.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let options =
            SqliteConnectOptions::from_str(&format!("sqlite://{}", path.as_ref().display()))?
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create an in-memory index (for testing).
    ///
    /// Limited to a single connection: each SQLite `:memory:`
    /// connection is its own database.
    pub async fn new_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn entry_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<IndexEntry> {
        let tier_str: String = row.try_get("tier")?;
        let tier = Tier::from_str(&tier_str).map_err(|_| IndexError::InvalidTier(tier_str))?;
        Ok(IndexEntry {
            record_id: row.try_get("record_id")?,
            tier,
            archive_path: row.try_get("archive_path")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn fetch_lease(&self, job_id: &str) -> Result<Option<Lease>> {
        let row = sqlx::query(
            "SELECT job_id, holder_id, epoch, expires_at FROM leases WHERE job_id = ?",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(Lease {
                job_id: row.try_get("job_id")?,
                holder_id: row.try_get("holder_id")?,
                epoch: row.try_get("epoch")?,
                expires_at: row.try_get("expires_at")?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl LocationIndex for SqliteLocationIndex {
    async fn lookup(&self, record_id: &str) -> Result<Option<IndexEntry>> {
        let row = sqlx::query(
            "SELECT record_id, tier, archive_path, updated_at FROM index_entries WHERE record_id = ?",
        )
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Self::entry_from_row(&row)).transpose()
    }

    async fn record_migrated(
        &self,
        record_id: &str,
        archive_path: &str,
        updated_at: i64,
    ) -> Result<MigrationMark> {
        // The WHERE clause on the upsert makes the transition one-way:
        // an already-cold entry is left untouched and reported as such.
        let result = sqlx::query(
            r#"
            INSERT INTO index_entries (record_id, tier, archive_path, updated_at)
            VALUES (?, 'cold', ?, ?)
            ON CONFLICT(record_id) DO UPDATE SET
                tier = 'cold',
                archive_path = excluded.archive_path,
                updated_at = excluded.updated_at
            WHERE index_entries.tier != 'cold'
            "#,
        )
        .bind(record_id)
        .bind(archive_path)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            debug!(record_id = %record_id, archive_path = %archive_path, "Recorded migration");
            Ok(MigrationMark::Recorded)
        } else {
            debug!(record_id = %record_id, "Record already cold");
            Ok(MigrationMark::AlreadyCold)
        }
    }

    async fn save_checkpoint(&self, checkpoint: &MigrationCheckpoint) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO migration_checkpoints
                (job_id, run_id, cursor_partition_key, cursor_record_id, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&checkpoint.job_id)
        .bind(&checkpoint.run_id)
        .bind(&checkpoint.cursor.partition_key)
        .bind(&checkpoint.cursor.record_id)
        .bind(checkpoint.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_checkpoint(&self, job_id: &str) -> Result<Option<MigrationCheckpoint>> {
        let row = sqlx::query(
            r#"
            SELECT job_id, run_id, cursor_partition_key, cursor_record_id, updated_at
            FROM migration_checkpoints WHERE job_id = ?
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(MigrationCheckpoint {
                job_id: row.try_get("job_id")?,
                run_id: row.try_get("run_id")?,
                cursor: Cursor {
                    partition_key: row.try_get("cursor_partition_key")?,
                    record_id: row.try_get("cursor_record_id")?,
                },
                updated_at: row.try_get("updated_at")?,
            })
        })
        .transpose()
    }

    async fn clear_checkpoint(&self, job_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM migration_checkpoints WHERE job_id = ?")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn acquire_lease(&self, job_id: &str, holder_id: &str, ttl_ms: i64) -> Result<Lease> {
        let now = Self::now_ms();
        let expires_at = now + ttl_ms;

        let result = sqlx::query(
            r#"
            INSERT INTO leases (job_id, holder_id, epoch, expires_at)
            VALUES (?, ?, 1, ?)
            ON CONFLICT(job_id) DO UPDATE SET
                holder_id = excluded.holder_id,
                epoch = leases.epoch + 1,
                expires_at = excluded.expires_at
            WHERE leases.holder_id = excluded.holder_id OR leases.expires_at <= ?
            "#,
        )
        .bind(job_id)
        .bind(holder_id)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let held = self.fetch_lease(job_id).await?;
            return Err(match held {
                Some(lease) => IndexError::LeaseHeld {
                    job_id: job_id.to_string(),
                    holder_id: lease.holder_id,
                    expires_at: lease.expires_at,
                },
                // Row vanished between statements; report contention.
                None => IndexError::LeaseHeld {
                    job_id: job_id.to_string(),
                    holder_id: String::new(),
                    expires_at: now,
                },
            });
        }

        self.fetch_lease(job_id).await?.ok_or_else(|| {
            IndexError::LeaseNotHeld {
                job_id: job_id.to_string(),
                holder_id: holder_id.to_string(),
            }
        })
    }

    async fn renew_lease(&self, job_id: &str, holder_id: &str, ttl_ms: i64) -> Result<Lease> {
        let expires_at = Self::now_ms() + ttl_ms;

        let result = sqlx::query(
            "UPDATE leases SET expires_at = ? WHERE job_id = ? AND holder_id = ?",
        )
        .bind(expires_at)
        .bind(job_id)
        .bind(holder_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(IndexError::LeaseNotHeld {
                job_id: job_id.to_string(),
                holder_id: holder_id.to_string(),
            });
        }

        self.fetch_lease(job_id).await?.ok_or_else(|| {
            IndexError::LeaseNotHeld {
                job_id: job_id.to_string(),
                holder_id: holder_id.to_string(),
            }
        })
    }

    async fn release_lease(&self, job_id: &str, holder_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM leases WHERE job_id = ? AND holder_id = ?")
            .bind(job_id)
            .bind(holder_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn make_index() -> SqliteLocationIndex {
        SqliteLocationIndex::new_in_memory().await.unwrap()
    }

    // ----------------------------------------------------------------
    // 1. Lookup / record_migrated
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn test_lookup_absent_returns_none() {
        let index = make_index().await;
        assert!(index.lookup("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_migrated_then_lookup() {
        let index = make_index().await;

        let mark = index
            .record_migrated("r1", "2023/11/14/r1", 1_700_000_000_000)
            .await
            .unwrap();
        assert_eq!(mark, MigrationMark::Recorded);

        let entry = index.lookup("r1").await.unwrap().unwrap();
        assert_eq!(entry.tier, Tier::Cold);
        assert_eq!(entry.archive_path.as_deref(), Some("2023/11/14/r1"));
        assert_eq!(entry.updated_at, 1_700_000_000_000);
    }

    #[tokio::test]
    async fn test_record_migrated_twice_is_already_cold() {
        let index = make_index().await;

        let first = index.record_migrated("r2", "2023/11/14/r2", 1).await.unwrap();
        let second = index.record_migrated("r2", "2023/11/14/r2", 2).await.unwrap();

        assert_eq!(first, MigrationMark::Recorded);
        assert_eq!(second, MigrationMark::AlreadyCold);

        // The second call must not touch the entry
        let entry = index.lookup("r2").await.unwrap().unwrap();
        assert_eq!(entry.updated_at, 1);
    }

    #[tokio::test]
    async fn test_cold_entry_never_reverts() {
        let index = make_index().await;

        index.record_migrated("r3", "path-a", 10).await.unwrap();
        // Even with a different path, an already-cold entry stays as-is
        let mark = index.record_migrated("r3", "path-b", 20).await.unwrap();
        assert_eq!(mark, MigrationMark::AlreadyCold);

        let entry = index.lookup("r3").await.unwrap().unwrap();
        assert_eq!(entry.archive_path.as_deref(), Some("path-a"));
    }

    // ----------------------------------------------------------------
    // 2. Checkpoints
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn test_checkpoint_save_load_clear() {
        let index = make_index().await;

        assert!(index.load_checkpoint("job-1").await.unwrap().is_none());

        let checkpoint = MigrationCheckpoint {
            job_id: "job-1".to_string(),
            run_id: "run-a".to_string(),
            cursor: Cursor {
                partition_key: "p5".to_string(),
                record_id: "r99".to_string(),
            },
            updated_at: 42,
        };
        index.save_checkpoint(&checkpoint).await.unwrap();

        let loaded = index.load_checkpoint("job-1").await.unwrap().unwrap();
        assert_eq!(loaded, checkpoint);

        index.clear_checkpoint("job-1").await.unwrap();
        assert!(index.load_checkpoint("job-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_checkpoint_overwrite_advances_cursor() {
        let index = make_index().await;

        let mut checkpoint = MigrationCheckpoint {
            job_id: "job-2".to_string(),
            run_id: "run-a".to_string(),
            cursor: Cursor {
                partition_key: "p1".to_string(),
                record_id: "r1".to_string(),
            },
            updated_at: 1,
        };
        index.save_checkpoint(&checkpoint).await.unwrap();

        checkpoint.cursor.record_id = "r2".to_string();
        checkpoint.updated_at = 2;
        index.save_checkpoint(&checkpoint).await.unwrap();

        let loaded = index.load_checkpoint("job-2").await.unwrap().unwrap();
        assert_eq!(loaded.cursor.record_id, "r2");
    }

    // ----------------------------------------------------------------
    // 3. Leases
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn test_acquire_lease_fresh() {
        let index = make_index().await;

        let lease = index.acquire_lease("job", "holder-a", 30_000).await.unwrap();
        assert_eq!(lease.holder_id, "holder-a");
        assert_eq!(lease.epoch, 1);
    }

    #[tokio::test]
    async fn test_acquire_lease_contention() {
        let index = make_index().await;

        index.acquire_lease("job", "holder-a", 30_000).await.unwrap();
        let err = index.acquire_lease("job", "holder-b", 30_000).await.unwrap_err();
        match err {
            IndexError::LeaseHeld { holder_id, .. } => assert_eq!(holder_id, "holder-a"),
            other => panic!("expected LeaseHeld, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reacquire_own_lease_bumps_epoch() {
        let index = make_index().await;

        let first = index.acquire_lease("job", "holder-a", 30_000).await.unwrap();
        let second = index.acquire_lease("job", "holder-a", 30_000).await.unwrap();
        assert_eq!(second.epoch, first.epoch + 1);
    }

    #[tokio::test]
    async fn test_expired_lease_is_reclaimable() {
        let index = make_index().await;

        // ttl of -1s yields an already-expired lease
        index.acquire_lease("job", "holder-a", -1_000).await.unwrap();

        let lease = index.acquire_lease("job", "holder-b", 30_000).await.unwrap();
        assert_eq!(lease.holder_id, "holder-b");
        assert_eq!(lease.epoch, 2);
    }

    #[tokio::test]
    async fn test_renew_extends_held_lease() {
        let index = make_index().await;

        let lease = index.acquire_lease("job", "holder-a", 1_000).await.unwrap();
        let renewed = index.renew_lease("job", "holder-a", 60_000).await.unwrap();
        assert!(renewed.expires_at > lease.expires_at);
        assert_eq!(renewed.epoch, lease.epoch);
    }

    #[tokio::test]
    async fn test_renew_fails_when_not_held() {
        let index = make_index().await;

        index.acquire_lease("job", "holder-a", 30_000).await.unwrap();
        let err = index.renew_lease("job", "holder-b", 30_000).await.unwrap_err();
        assert!(matches!(err, IndexError::LeaseNotHeld { .. }));
    }

    #[tokio::test]
    async fn test_release_lease_frees_job() {
        let index = make_index().await;

        index.acquire_lease("job", "holder-a", 30_000).await.unwrap();
        index.release_lease("job", "holder-a").await.unwrap();

        let lease = index.acquire_lease("job", "holder-b", 30_000).await.unwrap();
        assert_eq!(lease.holder_id, "holder-b");
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let index = make_index().await;
        // Releasing a lease that was never acquired is a no-op
        index.release_lease("job", "nobody").await.unwrap();
    }

    // ----------------------------------------------------------------
    // 4. File-backed store
    // ----------------------------------------------------------------

    #[tokio::test]
    async fn test_file_backed_index_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");

        {
            let index = SqliteLocationIndex::new(&path).await.unwrap();
            index.record_migrated("r1", "2023/11/14/r1", 7).await.unwrap();
        }

        let reopened = SqliteLocationIndex::new(&path).await.unwrap();
        let entry = reopened.lookup("r1").await.unwrap().unwrap();
        assert_eq!(entry.tier, Tier::Cold);
    }
}
