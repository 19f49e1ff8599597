//! Repository layer for local persistence.
//!
//! # Responsibility
//! - Define the local persistence contract consumed by the service layer.
//! - Keep SQL and envelope encoding details out of the engine.
//!
//! # Invariants
//! - Persistence is whole-collection: every save replaces the previous blob.
//!
//! # See also
//! - `db` for connection bootstrap and migrations.

pub mod snapshot_repo;

pub use snapshot_repo::{
    RepoError, RepoResult, SnapshotRepository, SqliteSnapshotRepository, TaskSnapshot,
    SNAPSHOT_VERSION,
};
