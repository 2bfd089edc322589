//! Failure records carried on a job.

use crate::core::StageKind;
use crate::errors::{FailureKind, StageError, StorageError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The fatal cause of a failed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    /// Failure category.
    pub kind: FailureKind,
    /// Stage that failed; `None` for failures after the last stage.
    pub stage: Option<StageKind>,
    /// Human-readable cause.
    pub message: String,
}

impl JobFailure {
    /// Creates a failure.
    #[must_use]
    pub fn new(kind: FailureKind, stage: Option<StageKind>, message: impl Into<String>) -> Self {
        Self {
            kind,
            stage,
            message: message.into(),
        }
    }
}

impl From<&StageError> for JobFailure {
    fn from(err: &StageError) -> Self {
        Self::new(err.kind(), Some(err.stage()), err.to_string())
    }
}

impl From<&StorageError> for JobFailure {
    fn from(err: &StorageError) -> Self {
        Self::new(FailureKind::Storage, None, err.to_string())
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// A failure that was tolerated: the job continued with degraded output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Stage that failed.
    pub stage: StageKind,
    /// Zero-based item within the stage (e.g. clip index).
    pub index: Option<usize>,
    /// Failure category.
    pub kind: FailureKind,
    /// Error message.
    pub error: String,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
}

impl FailureRecord {
    /// Creates a record from a stage error.
    #[must_use]
    pub fn from_error(err: &StageError) -> Self {
        Self {
            stage: err.stage(),
            index: None,
            kind: err.kind(),
            error: err.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Sets the item index.
    #[must_use]
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TaskError;

    #[test]
    fn test_job_failure_from_stage_error() {
        let err = StageError::input(StageKind::Scripting, "no scenes parsed");
        let failure = JobFailure::from(&err);
        assert_eq!(failure.kind, FailureKind::InputValidation);
        assert_eq!(failure.stage, Some(StageKind::Scripting));
        assert!(failure.message.contains("no scenes parsed"));
    }

    #[test]
    fn test_job_failure_from_storage_error() {
        let err = StorageError::NotFound("job_1".into());
        let failure = JobFailure::from(&err);
        assert_eq!(failure.kind, FailureKind::Storage);
        assert_eq!(failure.stage, None);
    }

    #[test]
    fn test_failure_record() {
        let err = StageError::Task {
            stage: StageKind::AudioSynthesis,
            source: TaskError::failed("r1", "silent"),
        };
        let record = FailureRecord::from_error(&err).with_index(1);
        assert_eq!(record.stage, StageKind::AudioSynthesis);
        assert_eq!(record.index, Some(1));
        assert_eq!(record.kind, FailureKind::ProviderTaskFailure);
        assert!(record.error.contains("silent"));
    }
}
