//! Pipeline coordination.
//!
//! This module provides:
//! - The single-job coordinator and its stage wiring
//! - The service that submits, schedules and inspects jobs

mod coordinator;
mod service;

#[cfg(test)]
mod integration_tests;

pub use coordinator::{download_path, PipelineCoordinator, PipelineStages};
pub use service::{VideoJobService, DEFAULT_REQUEST_TIMEOUT};
