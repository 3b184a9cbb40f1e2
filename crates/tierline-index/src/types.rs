//! Index Type Definitions
//!
//! ## Types Overview
//!
//! - [`IndexEntry`]: current tier and archive path for a record. The
//!   location index is the only authority for "where is record X now".
//! - [`Cursor`] / [`MigrationCheckpoint`]: stable scan position persisted
//!   after each processed page, so a restarted run resumes mid-scan.
//! - [`Lease`]: holder and expiry for orchestrator mutual exclusion.
//! - [`MigrationMark`]: outcome of `record_migrated`, distinguishing a
//!   fresh hot→cold transition from the benign already-cold case.
//!
//! Timestamps are i64 milliseconds since epoch throughout.

use serde::{Deserialize, Serialize};
use tierline_core::Tier;

/// Where a record currently lives, according to the location index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Record identifier (key)
    pub record_id: String,

    /// Current tier
    pub tier: Tier,

    /// Archive object key; `None` while the record is hot
    pub archive_path: Option<String>,

    /// Last update timestamp (milliseconds since epoch)
    pub updated_at: i64,
}

/// Outcome of recording a migration in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationMark {
    /// The entry transitioned hot→cold in this call.
    Recorded,
    /// The entry was already cold; idempotent no-op, treated as success.
    AlreadyCold,
}

/// Stable scan position: the last fully processed record.
///
/// Ordering is `(partition_key, record_id)`, matching the primary
/// store's scan order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub partition_key: String,
    pub record_id: String,
}

/// Persisted progress of a migration scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationCheckpoint {
    /// Stable job identity (same across runs)
    pub job_id: String,

    /// Identifier of the run that wrote this checkpoint
    pub run_id: String,

    /// Last fully processed page boundary
    pub cursor: Cursor,

    /// Checkpoint write timestamp (milliseconds since epoch)
    pub updated_at: i64,
}

/// An orchestrator run lease.
///
/// The epoch increments on every successful acquire, including a
/// takeover of an expired lease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub job_id: String,
    pub holder_id: String,
    pub epoch: i64,
    pub expires_at: i64,
}
