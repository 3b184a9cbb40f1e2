//! Migration Configuration
//!
//! Controls a scheduled (or on-demand) migration run:
//!
//! - **cutoff_days**: age threshold; records strictly older than
//!   `now - cutoff` are eligible (default: 90 days)
//! - **page_size**: records per scan page; the checkpoint advances
//!   after each fully processed page (default: 256)
//! - **worker_concurrency**: bounded worker pool size (default: 4)
//! - **max_retries**: attempts for transient archive failures
//!   (default: 3)
//! - **dry_run**: compute the eligible set without mutating any store
//! - **lease_ttl_ms**: run lease duration; an unrenewed lease becomes
//!   reclaimable after this (default: 30s)
//! - **max_payload_bytes**: archive payload ceiling (default: 300 KB)

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Age threshold in days (default: 90)
    #[serde(default = "default_cutoff_days")]
    pub cutoff_days: u64,

    /// Records per scan page (default: 256)
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Worker pool size (default: 4)
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    /// Attempts for transient archive failures (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Compute the eligible set without mutating any store
    #[serde(default)]
    pub dry_run: bool,

    /// Run lease duration in milliseconds (default: 30s)
    #[serde(default = "default_lease_ttl_ms")]
    pub lease_ttl_ms: i64,

    /// Archive payload size ceiling in bytes (default: 300 KB)
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            cutoff_days: default_cutoff_days(),
            page_size: default_page_size(),
            worker_concurrency: default_worker_concurrency(),
            max_retries: default_max_retries(),
            dry_run: false,
            lease_ttl_ms: default_lease_ttl_ms(),
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

impl MigrationConfig {
    /// Get the age cutoff as a Duration.
    pub fn cutoff(&self) -> Duration {
        Duration::from_secs(self.cutoff_days * 86_400)
    }
}

fn default_cutoff_days() -> u64 {
    90
}

fn default_page_size() -> usize {
    256
}

fn default_worker_concurrency() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_lease_ttl_ms() -> i64 {
    30_000
}

fn default_max_payload_bytes() -> usize {
    300 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MigrationConfig::default();
        assert_eq!(config.cutoff_days, 90);
        assert_eq!(config.cutoff(), Duration::from_secs(90 * 86_400));
        assert_eq!(config.page_size, 256);
        assert!(!config.dry_run);
    }

    #[test]
    fn test_serde_defaults_fill_missing_fields() {
        let config: MigrationConfig = serde_json::from_str(r#"{"cutoff_days": 30}"#).unwrap();
        assert_eq!(config.cutoff_days, 30);
        assert_eq!(config.worker_concurrency, 4);
        assert_eq!(config.lease_ttl_ms, 30_000);
    }
}
