//! Job lifecycle events.
//!
//! The coordinator reports progress to an [`EventSink`] passed in at
//! construction. Event types are the constants below.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// A job began executing.
pub const JOB_STARTED: &str = "job.started";
/// A stage began.
pub const STAGE_STARTED: &str = "stage.started";
/// A stage finished successfully.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// A tolerated stage failed for one item; the job continues.
pub const STAGE_TOLERATED_FAILURE: &str = "stage.tolerated_failure";
/// A job completed.
pub const JOB_COMPLETED: &str = "job.completed";
/// A job failed.
pub const JOB_FAILED: &str = "job.failed";
