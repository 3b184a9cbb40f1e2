//! Migration Error Types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MigrateError>;

#[derive(Debug, Error)]
pub enum MigrateError {
    /// Another orchestrator holds the run lease. The run aborts cleanly
    /// with no partial state.
    #[error("Migration lease for job {job_id} held by {holder_id}")]
    LeaseContention { job_id: String, holder_id: String },

    #[error("Storage error: {0}")]
    Storage(#[from] tierline_storage::Error),

    #[error("Index error: {0}")]
    Index(#[from] tierline_index::IndexError),

    #[error("Worker task failed: {0}")]
    TaskJoin(String),
}
