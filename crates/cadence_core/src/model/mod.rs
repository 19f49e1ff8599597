//! Task domain model.
//!
//! # Responsibility
//! - Define canonical data structures used by the scheduling engine.
//! - Keep one record shape for one-off tasks, recurring tasks and their
//!   materialized instances.
//!
//! # Invariants
//! - Every task is identified by a stable `TaskId`.
//! - Recurring completion state lives in the per-day ledger only.

pub mod task;
