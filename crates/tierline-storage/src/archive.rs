//! Archive Writer and Reader
//!
//! Serializes records into the archive object store at deterministic
//! keys and fetches them back.
//!
//! ## Envelope Format
//!
//! Each archived record is a self-describing JSON envelope carrying the
//! identifier, partition key, timestamp, and base64 payload. A fetch
//! needs no side lookup to rebuild the full [`Record`], which is what
//! lets the read router serve a record from the archive path alone.
//!
//! ## Idempotency
//!
//! The object key is a pure function of `(id, timestamp)` and the
//! envelope content is a pure function of the record, so re-writing the
//! same record is an overwrite with identical bytes: a no-op from the
//! caller's perspective. The migration protocol leans on this for crash
//! recovery.
//!
//! ## Failure Modes
//!
//! - `PayloadTooLarge`: the payload exceeds the configured ceiling;
//!   non-retryable, surfaced to the orchestrator which skips the record
//! - `ArchiveUnavailable`: transient backend failure after the writer's
//!   own bounded exponential-backoff retries

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use object_store::{path::Path as ObjectPath, ObjectStore};
use serde::{Deserialize, Serialize};
use tierline_core::{archive_key, Record};
use tracing::{debug, warn};

use crate::config::ArchiveConfig;
use crate::error::{Error, Result};

/// On-disk representation of an archived record.
#[derive(Debug, Serialize, Deserialize)]
struct ArchiveEnvelope {
    id: String,
    partition_key: String,
    timestamp: i64,
    payload: String,
}

impl ArchiveEnvelope {
    fn from_record(record: &Record) -> Self {
        Self {
            id: record.id.clone(),
            partition_key: record.partition_key.clone(),
            timestamp: record.timestamp,
            payload: BASE64.encode(&record.payload),
        }
    }

    fn into_record(self) -> Result<Record> {
        let payload = BASE64
            .decode(&self.payload)
            .map_err(|e| Error::ArchiveUnavailable(format!("corrupt envelope payload: {e}")))?;
        Ok(Record {
            id: self.id,
            partition_key: self.partition_key,
            timestamp: self.timestamp,
            payload: Bytes::from(payload),
        })
    }
}

/// Writes records into the archive store at deterministic keys.
pub struct ArchiveWriter {
    store: Arc<dyn ObjectStore>,
    config: ArchiveConfig,
}

impl ArchiveWriter {
    pub fn new(store: Arc<dyn ObjectStore>, config: ArchiveConfig) -> Self {
        Self { store, config }
    }

    /// Archive a record, returning its archive path.
    ///
    /// Transient put failures are retried with exponential backoff
    /// (100ms * 2^attempt) up to the configured attempt count.
    pub async fn write(&self, record: &Record) -> Result<String> {
        if record.payload.len() > self.config.max_payload_bytes {
            return Err(Error::PayloadTooLarge {
                size: record.payload.len(),
                max: self.config.max_payload_bytes,
            });
        }

        let key = archive_key(&record.id, record.timestamp);
        let path = ObjectPath::from(key.as_str());
        let data = Bytes::from(serde_json::to_vec(&ArchiveEnvelope::from_record(record))?);

        let attempts = self.config.upload_retries.max(1);
        for attempt in 0..attempts {
            match self.store.put(&path, data.clone()).await {
                Ok(_) => {
                    debug!(
                        record_id = %record.id,
                        archive_path = %key,
                        size = data.len(),
                        attempt = attempt + 1,
                        "Archived record"
                    );
                    return Ok(key);
                }
                Err(e) if attempt < attempts - 1 => {
                    let backoff_ms = 100 * 2_u64.pow(attempt);
                    warn!(
                        record_id = %record.id,
                        archive_path = %key,
                        attempt = attempt + 1,
                        backoff_ms,
                        error = %e,
                        "Archive put failed, retrying"
                    );
                    tokio::time::sleep(tokio::time::Duration::from_millis(backoff_ms)).await;
                }
                Err(e) => {
                    warn!(
                        record_id = %record.id,
                        archive_path = %key,
                        error = %e,
                        "Archive put failed after all retries"
                    );
                    return Err(Error::ArchiveUnavailable(e.to_string()));
                }
            }
        }

        unreachable!()
    }
}

/// Fetches archived records back out of the archive store.
#[derive(Clone)]
pub struct ArchiveReader {
    store: Arc<dyn ObjectStore>,
}

impl ArchiveReader {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Fetch an archived record by path.
    ///
    /// `Ok(None)` means the object does not exist; transient backend
    /// failures surface as `ArchiveUnavailable` so callers can tell a
    /// genuine miss from an unreachable archive.
    pub async fn fetch(&self, path: &str) -> Result<Option<Record>> {
        let object_path = ObjectPath::from(path);
        let result = match self.store.get(&object_path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(Error::ArchiveUnavailable(e.to_string())),
        };

        let data = result
            .bytes()
            .await
            .map_err(|e| Error::ArchiveUnavailable(e.to_string()))?;

        let envelope: ArchiveEnvelope = serde_json::from_slice(&data)?;
        Ok(Some(envelope.into_record()?))
    }
}
