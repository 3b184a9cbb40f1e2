//! Read Router
//!
//! Serves `get(id)` across both tiers behind a single lookup contract:
//!
//! 1. Primary store read (fast path, bounded timeout); a hit returns
//!    immediately.
//! 2. On a miss, the location index is consulted; a cold entry's
//!    archive path is fetched under the (longer) archive timeout.
//! 3. With no index entry — not yet created, or the index itself
//!    unreachable — the candidate archive path is reconstructed from
//!    the identifier and a timestamp hint and fetched; a miss there is
//!    `NotFound`.
//! 4. When neither tier can answer, the result is `ReadFailure`,
//!    distinct from `NotFound`.
//!
//! An overall deadline bounds the whole call regardless of how the
//! fallback chain unfolds.
//!
//! ## Reads During Migration
//!
//! The orchestrator deletes from the primary store only after the index
//! entry is durable, so a read racing a migration either still finds
//! the record hot, or finds it indexed and fetches cold. It is never
//! the case that neither store has it. The router never mutates the
//! index; the outcome of a racing read is always plain success.

use std::sync::Arc;

use tierline_core::{archive_key, Record, Tier};
use tierline_index::LocationIndex;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::archive::ArchiveReader;
use crate::config::ReadConfig;
use crate::error::{Error, Result};
use crate::primary::PrimaryStore;

/// Result of a routed read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The record, from whichever tier held it.
    Hit(Record),
    /// Genuinely absent from both tiers. A valid outcome, not an error.
    NotFound,
}

/// Routes reads across the primary store and the archive.
pub struct ReadRouter {
    primary: Arc<dyn PrimaryStore>,
    index: Arc<dyn LocationIndex>,
    archive: ArchiveReader,
    config: ReadConfig,
}

impl ReadRouter {
    pub fn new(
        primary: Arc<dyn PrimaryStore>,
        index: Arc<dyn LocationIndex>,
        archive: ArchiveReader,
        config: ReadConfig,
    ) -> Self {
        Self {
            primary,
            index,
            archive,
            config,
        }
    }

    /// Write a record. Writes always go to the primary store; tiering
    /// is transparent to writers.
    pub async fn put(&self, record: Record) -> Result<()> {
        self.primary.put(record).await
    }

    /// Read a record from whichever tier currently holds it.
    ///
    /// `timestamp_hint` lets the router reconstruct the archive path
    /// when the index has no entry for the record.
    pub async fn get(&self, record_id: &str, timestamp_hint: Option<i64>) -> Result<ReadOutcome> {
        match timeout(
            self.config.overall_timeout(),
            self.get_inner(record_id, timestamp_hint),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(record_id = %record_id, "Read exceeded overall deadline");
                Err(Error::ReadFailure(record_id.to_string()))
            }
        }
    }

    async fn get_inner(
        &self,
        record_id: &str,
        timestamp_hint: Option<i64>,
    ) -> Result<ReadOutcome> {
        // Step 1: primary fast path.
        let mut primary_down = false;
        match timeout(self.config.primary_timeout(), self.primary.get(record_id)).await {
            Ok(Ok(Some(record))) => {
                debug!(record_id = %record_id, "Primary hit");
                return Ok(ReadOutcome::Hit(record));
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => {
                warn!(record_id = %record_id, error = %e, "Primary read failed, falling back");
                primary_down = true;
            }
            Err(_) => {
                warn!(record_id = %record_id, "Primary read timed out, falling back");
                primary_down = true;
            }
        }

        // Step 2: consult the location index.
        let entry = match self.index.lookup(record_id).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(record_id = %record_id, error = %e, "Index unreachable, reconstructing path");
                None
            }
        };

        if let Some(entry) = entry {
            if entry.tier == Tier::Cold {
                if let Some(path) = entry.archive_path.as_deref() {
                    return self.fetch_cold(record_id, path).await;
                }
            }
            // Indexed hot but the primary missed: absent (or the
            // primary is down and nothing cold exists to fall back to).
            return if primary_down {
                Err(Error::ReadFailure(record_id.to_string()))
            } else {
                Ok(ReadOutcome::NotFound)
            };
        }

        // Step 3: no entry; reconstruct the candidate path.
        if let Some(hint) = timestamp_hint {
            let path = archive_key(record_id, hint);
            match timeout(self.config.archive_timeout(), self.archive.fetch(&path)).await {
                Ok(Ok(Some(record))) => {
                    debug!(record_id = %record_id, archive_path = %path, "Archive hit via reconstructed path");
                    return Ok(ReadOutcome::Hit(record));
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    warn!(record_id = %record_id, error = %e, "Archive fetch failed");
                    return Err(Error::ReadFailure(record_id.to_string()));
                }
                Err(_) => {
                    warn!(record_id = %record_id, "Archive fetch timed out");
                    return Err(Error::ReadFailure(record_id.to_string()));
                }
            }
        }

        // Step 4: nothing found; a healthy-primary miss is NotFound,
        // an unreachable primary is a read failure.
        if primary_down {
            Err(Error::ReadFailure(record_id.to_string()))
        } else {
            Ok(ReadOutcome::NotFound)
        }
    }

    async fn fetch_cold(&self, record_id: &str, path: &str) -> Result<ReadOutcome> {
        match timeout(self.config.archive_timeout(), self.archive.fetch(path)).await {
            Ok(Ok(Some(record))) => {
                debug!(record_id = %record_id, archive_path = %path, "Archive hit");
                Ok(ReadOutcome::Hit(record))
            }
            // Indexed cold but the object is gone: genuinely absent.
            Ok(Ok(None)) => Ok(ReadOutcome::NotFound),
            Ok(Err(e)) => {
                warn!(record_id = %record_id, archive_path = %path, error = %e, "Archive fetch failed");
                Err(Error::ReadFailure(record_id.to_string()))
            }
            Err(_) => {
                warn!(record_id = %record_id, archive_path = %path, "Archive fetch timed out");
                Err(Error::ReadFailure(record_id.to_string()))
            }
        }
    }
}
