//! SQLite release ledger for the publication pipeline.
//!
//! The store is the only shared resource between concurrent pipeline tasks:
//! the orchestrator and the scheduler read and mutate releases exclusively
//! through the [`Repository`]'s narrow operations (single timestamp clear,
//! single visibility flip, single link upsert) and hold no long-lived state
//! of their own.
//!
//! # Entities
//! - **Releases**: one publishable unit per row, owned by a project, with a
//!   visibility flag and an optional scheduled publication timestamp.
//! - **ReleaseFiles**: the files shipped by a release; immutable once
//!   ingested, ordered by file name.
//! - **ReleaseLinks**: outbound announcement URLs, one per provider tag,
//!   enforced by a schema constraint (the provider is an explicit column,
//!   never inferred from the URL).

mod db;
pub mod error;
mod models;
mod repo;

pub use crate::db::Database;
pub use crate::models::{Language, Release, ReleaseFile, ReleaseLink};
pub use crate::repo::{NewRelease, NewReleaseFile, Repository};

/// Provider tag under which a release's magnet link is recorded.
pub const MAGNET_PROVIDER: &str = "magnet";
