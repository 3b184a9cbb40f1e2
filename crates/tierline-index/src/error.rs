//! Index Error Types
//!
//! All location-index operations return `Result<T>` aliased to
//! `Result<T, IndexError>` for clean propagation with `?`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Lease for job {job_id} held by {holder_id} until {expires_at}")]
    LeaseHeld {
        job_id: String,
        holder_id: String,
        expires_at: i64,
    },

    #[error("Lease for job {job_id} not held by {holder_id}")]
    LeaseNotHeld { job_id: String, holder_id: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid tier value: {0}")]
    InvalidTier(String),

    #[error("Migration error: {0}")]
    Migration(String),
}

impl From<sqlx::migrate::MigrateError> for IndexError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        IndexError::Migration(e.to_string())
    }
}
