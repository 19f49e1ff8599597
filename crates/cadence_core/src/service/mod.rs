//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store, persistence, sync and reminders into use-case APIs.
//! - Keep FFI and CLI layers decoupled from storage details.

pub mod task_service;

pub use task_service::{
    FlushReport, OutgoingOp, PullReport, ServiceResult, TaskService, TaskServiceError,
};
