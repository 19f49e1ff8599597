//! Host bridge for the scheduling engine.

pub mod api;
