//! Job records and the job registry.

mod failure;
mod record;
mod registry;

pub use failure::{FailureRecord, JobFailure};
pub use record::{
    JobId, JobInputs, JobRecord, JobResult, PROGRESS_COMPLETED, PROGRESS_INITIALIZING,
    PROGRESS_QUEUED, PROGRESS_SAVING,
};
pub use registry::{JobRegistry, JobWriter, RegistryStats};
