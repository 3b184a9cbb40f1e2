//! Storage Configuration
//!
//! ## ArchiveConfig
//!
//! Controls the archive write path:
//! - **max_payload_bytes**: payload size ceiling (default: 300 KB);
//!   larger records are rejected as non-retryable
//! - **upload_retries**: attempts for transient archive failures with
//!   exponential backoff (default: 3)
//!
//! ## ReadConfig
//!
//! Per-tier read timeouts plus an overall router deadline. Archive
//! reads are allowed a longer timeout than primary reads, but the
//! router never exceeds `overall_timeout_ms` end to end.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Payload size ceiling in bytes (default: 300 KB)
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    /// Attempts for transient archive-put failures (default: 3)
    #[serde(default = "default_upload_retries")]
    pub upload_retries: u32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload_bytes(),
            upload_retries: default_upload_retries(),
        }
    }
}

fn default_max_payload_bytes() -> usize {
    300 * 1024
}

fn default_upload_retries() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadConfig {
    /// Primary store read timeout in milliseconds (default: 2s)
    #[serde(default = "default_primary_timeout_ms")]
    pub primary_timeout_ms: u64,

    /// Archive fetch timeout in milliseconds (default: 5s)
    #[serde(default = "default_archive_timeout_ms")]
    pub archive_timeout_ms: u64,

    /// Overall deadline for a single `get` in milliseconds (default: 8s)
    #[serde(default = "default_overall_timeout_ms")]
    pub overall_timeout_ms: u64,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            primary_timeout_ms: default_primary_timeout_ms(),
            archive_timeout_ms: default_archive_timeout_ms(),
            overall_timeout_ms: default_overall_timeout_ms(),
        }
    }
}

impl ReadConfig {
    pub fn primary_timeout(&self) -> Duration {
        Duration::from_millis(self.primary_timeout_ms)
    }

    pub fn archive_timeout(&self) -> Duration {
        Duration::from_millis(self.archive_timeout_ms)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_millis(self.overall_timeout_ms)
    }
}

fn default_primary_timeout_ms() -> u64 {
    2_000
}

fn default_archive_timeout_ms() -> u64 {
    5_000
}

fn default_overall_timeout_ms() -> u64 {
    8_000
}
