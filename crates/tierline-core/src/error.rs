//! Core Error Types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid tier: {0}")]
    InvalidTier(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),
}
