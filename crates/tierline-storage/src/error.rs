//! Storage Error Types
//!
//! ## Error Categories
//!
//! - `PayloadTooLarge`: non-retryable; the orchestrator skips and logs
//!   the record
//! - `ArchiveUnavailable`: transient archive backend failure, already
//!   retried with backoff at the writer boundary
//! - `PrimaryUnavailable`: transient primary store failure
//! - `ReadFailure`: both tiers unreachable, or the router deadline
//!   expired — distinct from a genuine not-found
//!
//! All storage operations return `Result<T>` aliased to
//! `Result<T, Error>` for clean propagation with `?`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Archive unavailable: {0}")]
    ArchiveUnavailable(String),

    #[error("Primary store unavailable: {0}")]
    PrimaryUnavailable(String),

    #[error("Read failed for {0}: both tiers unreachable")]
    ReadFailure(String),

    #[error("Index error: {0}")]
    Index(#[from] tierline_index::IndexError),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Archive envelope error: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Error {
    /// Whether the operation may succeed if retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::ArchiveUnavailable(_) | Error::PrimaryUnavailable(_) | Error::ReadFailure(_)
        )
    }
}
