//! Job state and remote task status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a job.
///
/// States only move forward: `Created -> Running -> {Completed | Failed}`.
/// A job that never got to run may go straight from `Created` to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Registered, not yet started.
    #[default]
    Created,
    /// The pipeline is executing.
    Running,
    /// The final artifact was composed and persisted.
    Completed,
    /// A fatal error ended the pipeline.
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl JobState {
    /// Returns true if no further transition is possible.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true while the job still has work ahead of it.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if moving from `self` to `next` keeps the state monotonic.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Running | Self::Failed)
                | (Self::Running, Self::Completed | Self::Failed)
        )
    }
}

/// Provider-neutral status of a remote asynchronous task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted, waiting to start.
    Pending,
    /// Work in progress.
    Running,
    /// Finished with a result.
    Succeeded,
    /// Finished without a result.
    Failed,
    /// The provider answered with something we do not recognise.
    Unknown,
}

impl TaskStatus {
    /// Normalizes a provider status string.
    ///
    /// Matching is case-insensitive; providers disagree on both spelling and
    /// casing (`completed`, `COMPLETED`, `succeeded`, `IN_QUEUE`, ...).
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "succeeded" | "completed" | "success" => Self::Succeeded,
            "failed" | "error" => Self::Failed,
            "starting" | "pending" | "queued" | "in_queue" | "created" => Self::Pending,
            "processing" | "running" | "in_progress" => Self::Running,
            _ => Self::Unknown,
        }
    }

    /// Returns true if polling can stop.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}
