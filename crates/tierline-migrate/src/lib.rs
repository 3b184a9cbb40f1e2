//! Tierline Migration Engine
//!
//! Moves aged-out records from the primary store to the archive without
//! loss or downtime. The protocol per record is write→index→delete:
//! the payload is durably archived, the location index commits the
//! archive path, and only then is the record deleted from the primary
//! store. Reads racing a migration always find the record in one tier
//! or the other.
//!
//! - [`MigrationOrchestrator`]: paged, checkpointed batch scan with a
//!   bounded worker pool
//! - [`LeaseCoordinator`]: at most one live run per job, with
//!   expiry-based reclaim after crashes
//! - [`MigrationConfig`] / [`MigrationReport`]: the batch trigger
//!   surface and its outcome

pub mod config;
pub mod error;
pub mod lease;
pub mod orchestrator;

pub use config::MigrationConfig;
pub use error::{MigrateError, Result};
pub use lease::{LeaseCoordinator, LeaseGuard};
pub use orchestrator::{MigrationOrchestrator, MigrationReport};
