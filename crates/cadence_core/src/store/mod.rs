//! In-memory task store.
//!
//! # Responsibility
//! - Expose the single-writer task collection and its query surface.
//!
//! # See also
//! - `service::task_service` for the persisted, synced facade.

pub mod task_store;

pub use task_store::{
    CascadePlan, EditOutcome, Occurrence, RepairReport, StoreError, StoreResult, TaskStore,
};
