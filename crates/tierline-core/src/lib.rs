//! Tierline Core Types
//!
//! Shared building blocks for the tierline age-tiered record store:
//!
//! - [`Record`]: the unit of data moved between tiers
//! - [`Tier`]: hot/cold classification with a pure age classifier
//! - [`archive_key`]: deterministic archive object key derivation
//!
//! Everything here is pure data and pure functions. Storage backends,
//! the location index, and the migration orchestrator live in the
//! `tierline-index`, `tierline-storage`, and `tierline-migrate` crates.

pub mod archive_key;
pub mod error;
pub mod record;
pub mod tier;

pub use archive_key::archive_key;
pub use error::{CoreError, Result};
pub use record::Record;
pub use tier::Tier;
