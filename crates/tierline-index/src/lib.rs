//! Tierline Location Index
//!
//! The durable "brain" of the tiering layer: it knows where every
//! migrated record lives and carries the orchestrator's persisted state.
//!
//! ## What Is Tracked
//!
//! - **Index entries**: record identifier → {tier, archive path}. The
//!   read router consults this after a primary-store miss; the
//!   orchestrator writes it exactly once per migration (idempotently).
//! - **Migration checkpoints**: last fully processed scan position per
//!   job, so an interrupted run resumes mid-scan.
//! - **Leases**: at most one live orchestrator run per job, with
//!   expiry-based reclaim of leases left behind by crashed runs.
//!
//! ## Safety Role
//!
//! The index is what makes delete-from-primary safe: an entry's archive
//! path must be durably committed *before* deletion, so a read that
//! misses the primary store always finds the archive location (or can
//! reconstruct it). Entries move hot→cold only, never back.
//!
//! ## Backend
//!
//! SQLite via sqlx with embedded migrations; WAL mode allows concurrent
//! readers while the orchestrator writes. The store is `Send + Sync`
//! and shared via `Arc<dyn LocationIndex>`.

pub mod error;
pub mod store;
pub mod types;

pub use error::{IndexError, Result};
pub use store::{LocationIndex, SqliteLocationIndex};
pub use types::{Cursor, IndexEntry, Lease, MigrationCheckpoint, MigrationMark};
