//! Tierline Storage Layer
//!
//! The two storage tiers and the read path that reconciles them.
//!
//! ## Components
//!
//! - [`PrimaryStore`]: the seam to the low-latency store holding hot
//!   records. Point reads/writes, idempotent deletes, and a stable
//!   paged scan used by the migration orchestrator.
//! - [`ArchiveWriter`] / [`ArchiveReader`]: idempotent serialization of
//!   records into an `object_store` backend at deterministic
//!   `{year}/{month}/{day}/{id}` keys.
//! - [`ReadRouter`]: `get(id)` that tries the primary store, falls back
//!   through the location index to the archive, and reconstructs the
//!   archive path when the index has no answer.
//!
//! ## Data Flow
//!
//! ```text
//! writers ──put──▶ PrimaryStore ──scan──▶ orchestrator ──▶ ArchiveWriter ──▶ object store
//!                      ▲                                        │
//! readers ──get──▶ ReadRouter ◀──── LocationIndex ◀─────────────┘
//!                      └───────────── ArchiveReader ◀── object store
//! ```
//!
//! The safety-relevant ordering (archive write and index commit before
//! primary delete) lives in `tierline-migrate`; this crate supplies the
//! idempotent primitives that make that protocol restartable.

pub mod archive;
pub mod config;
pub mod error;
pub mod primary;
pub mod router;

pub use archive::{ArchiveReader, ArchiveWriter};
pub use config::{ArchiveConfig, ReadConfig};
pub use error::{Error, Result};
pub use primary::{MemoryPrimaryStore, PrimaryStore, SqlitePrimaryStore};
pub use router::{ReadOutcome, ReadRouter};
