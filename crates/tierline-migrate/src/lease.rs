//! Lease Coordination
//!
//! Ensures at most one orchestrator run is active per job. The lease is
//! persisted in the location index; a holder renews it in the
//! background at a third of the TTL, and a lease left behind by a
//! crashed run becomes reclaimable once it expires.
//!
//! This is not what makes migration safe (idempotency covers double
//! migration); it prevents duplicate work and contention between
//! overlapping scheduled runs.

use std::sync::Arc;
use std::time::Duration;

use tierline_index::{IndexError, LocationIndex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{MigrateError, Result};

/// Acquires and maintains the run lease for a job.
pub struct LeaseCoordinator {
    index: Arc<dyn LocationIndex>,
    holder_id: String,
}

impl LeaseCoordinator {
    pub fn new(index: Arc<dyn LocationIndex>, holder_id: impl Into<String>) -> Self {
        Self {
            index,
            holder_id: holder_id.into(),
        }
    }

    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    /// Acquire the run lease, spawning a background renewal task.
    ///
    /// Fails with [`MigrateError::LeaseContention`] while another
    /// holder has a live lease.
    pub async fn acquire(&self, job_id: &str, ttl_ms: i64) -> Result<LeaseGuard> {
        let lease = self
            .index
            .acquire_lease(job_id, &self.holder_id, ttl_ms)
            .await
            .map_err(|e| match e {
                IndexError::LeaseHeld {
                    job_id, holder_id, ..
                } => MigrateError::LeaseContention { job_id, holder_id },
                other => MigrateError::Index(other),
            })?;

        info!(
            job_id = %job_id,
            holder_id = %self.holder_id,
            epoch = lease.epoch,
            expires_at = lease.expires_at,
            "Acquired migration lease"
        );

        let renewal = spawn_renewal_task(
            Arc::clone(&self.index),
            job_id.to_string(),
            self.holder_id.clone(),
            ttl_ms,
        );

        Ok(LeaseGuard {
            index: Arc::clone(&self.index),
            job_id: job_id.to_string(),
            holder_id: self.holder_id.clone(),
            epoch: lease.epoch,
            renewal: Some(renewal),
        })
    }
}

/// A held run lease.
///
/// Call [`LeaseGuard::close`] to stop renewal and release the lease. A
/// guard dropped without `close` stops renewing and leaves the lease to
/// expire by TTL, which is how a crashed run's lease gets reclaimed.
pub struct LeaseGuard {
    index: Arc<dyn LocationIndex>,
    job_id: String,
    holder_id: String,
    epoch: i64,
    renewal: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for LeaseGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseGuard")
            .field("job_id", &self.job_id)
            .field("holder_id", &self.holder_id)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

impl LeaseGuard {
    pub fn epoch(&self) -> i64 {
        self.epoch
    }

    /// Stop the renewal task and release the lease.
    pub async fn close(mut self) -> Result<()> {
        if let Some(handle) = self.renewal.take() {
            handle.abort();
            let _ = handle.await;
        }

        self.index
            .release_lease(&self.job_id, &self.holder_id)
            .await?;

        info!(
            job_id = %self.job_id,
            holder_id = %self.holder_id,
            "Released migration lease"
        );
        Ok(())
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.renewal.take() {
            handle.abort();
        }
    }
}

fn spawn_renewal_task(
    index: Arc<dyn LocationIndex>,
    job_id: String,
    holder_id: String,
    ttl_ms: i64,
) -> JoinHandle<()> {
    // Renew at a third of the TTL, same cadence the lease was sized for.
    let interval = Duration::from_millis((ttl_ms.max(30) / 3) as u64);

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            match index.renew_lease(&job_id, &holder_id, ttl_ms).await {
                Ok(lease) => {
                    debug!(
                        job_id = %job_id,
                        holder_id = %holder_id,
                        expires_at = lease.expires_at,
                        "Lease renewed"
                    );
                }
                Err(e) => {
                    warn!(
                        job_id = %job_id,
                        holder_id = %holder_id,
                        error = %e,
                        "Lease renewal failed, stopping renewal task"
                    );
                    break;
                }
            }
        }
    })
}
