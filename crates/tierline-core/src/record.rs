//! Record Data Structure
//!
//! A record is a single entry in the tiered store. It carries a stable
//! unique identifier, a partition key used for scan ordering and work
//! partitioning, an event timestamp, and an opaque payload.
//!
//! ## Design Decisions
//! - Uses `bytes::Bytes` for the payload (cheap clones, no copies on slice)
//! - Timestamps are i64 milliseconds since epoch
//! - `id` and `partition_key` are distinct fields; callers must never
//!   assume they are equal
//! - The record's tier is derived from its timestamp, never stored here

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// A single record in the tiered store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Unique, stable identifier
    pub id: String,

    /// Partition/shard key (ordering and work distribution)
    pub partition_key: String,

    /// Event timestamp in milliseconds since epoch
    pub timestamp: i64,

    /// Opaque payload
    pub payload: Bytes,
}

impl Record {
    pub fn new(
        id: impl Into<String>,
        partition_key: impl Into<String>,
        timestamp: i64,
        payload: Bytes,
    ) -> Self {
        Self {
            id: id.into(),
            partition_key: partition_key.into(),
            timestamp,
            payload,
        }
    }

    /// Estimate the size of this record in bytes
    pub fn estimated_size(&self) -> usize {
        self.id.len() + self.partition_key.len() + 8 + self.payload.len()
    }
}
