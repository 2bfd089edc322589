//! Error types for the clipflow engine.
//!
//! Each layer has its own error enum; every error that can end a job knows
//! how to classify itself into a [`FailureKind`] so the job record can carry
//! a stable, serializable cause.

use crate::core::StageKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The main error type for clipflow operations.
#[derive(Debug, Error)]
pub enum ClipflowError {
    /// A pipeline stage failed.
    #[error("{0}")]
    Stage(#[from] StageError),

    /// The storage collaborator failed.
    #[error("{0}")]
    Storage(#[from] StorageError),

    /// A registry operation was rejected.
    #[error("{0}")]
    Registry(#[from] RegistryError),

    /// Configuration could not be loaded or validated.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error("{0}")]
    Transport(#[from] TransportError),
}

/// Failure categories surfaced on a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Inputs (or a parsed intermediate) were rejected before remote work.
    InputValidation,
    /// A provider refused or failed the work.
    ProviderTaskFailure,
    /// A provider answered with a payload of unknown shape.
    ResponseShape,
    /// A remote task did not reach a terminal state in time.
    Timeout,
    /// The final artifact could not be persisted.
    Storage,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InputValidation => write!(f, "input_validation"),
            Self::ProviderTaskFailure => write!(f, "provider_task_failure"),
            Self::ResponseShape => write!(f, "response_shape"),
            Self::Timeout => write!(f, "timeout"),
            Self::Storage => write!(f, "storage"),
        }
    }
}

/// A single HTTP exchange failed.
///
/// Inside a poll loop these are transient; outside it (submissions, text
/// generation) the caller decides.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request never produced a response.
    #[error("request to {url} failed: {message}")]
    Connection {
        /// Target URL.
        url: String,
        /// Underlying client error.
        message: String,
    },

    /// The provider answered with a non-success status.
    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        /// Target URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body (possibly truncated).
        body: String,
    },
}

impl TransportError {
    /// Creates a connection error.
    #[must_use]
    pub fn connection(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a status error.
    #[must_use]
    pub fn status(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            url: url.into(),
            status,
            body: body.into(),
        }
    }
}

/// A provider response did not match any known shape.
#[derive(Debug, Clone, Error)]
#[error("unrecognised {context} response: {message}")]
pub struct ResponseShapeError {
    /// What was being decoded (e.g. "task result", "idea").
    pub context: String,
    /// What was missing or malformed.
    pub message: String,
}

impl ResponseShapeError {
    /// Creates a new response shape error.
    #[must_use]
    pub fn new(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            message: message.into(),
        }
    }
}

/// Non-success outcomes of awaiting a remote task.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// The provider reported the task as failed.
    #[error("remote task {task_id} failed: {reason}")]
    Failed {
        /// Provider task identifier.
        task_id: String,
        /// Provider-supplied reason.
        reason: String,
    },

    /// No terminal status was observed within the wait budget.
    #[error("remote task {task_id} timed out after {}s", waited.as_secs())]
    Timeout {
        /// Provider task identifier.
        task_id: String,
        /// How long the poller waited.
        waited: Duration,
    },

    /// The task succeeded but its result could not be located.
    #[error(transparent)]
    Shape(#[from] ResponseShapeError),
}

impl TaskError {
    /// Creates a failed error.
    #[must_use]
    pub fn failed(task_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            task_id: task_id.into(),
            reason: reason.into(),
        }
    }

    /// Returns the failure category.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Failed { .. } => FailureKind::ProviderTaskFailure,
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Shape(_) => FailureKind::ResponseShape,
        }
    }
}

/// Error produced by a text-generation call.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    /// The request failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The completion envelope had no usable content.
    #[error(transparent)]
    Shape(#[from] ResponseShapeError),
}

/// Error raised by a stage executor.
#[derive(Debug, Clone, Error)]
pub enum StageError {
    /// The stage's input was unusable; no remote work was attempted.
    #[error("{stage} rejected its input: {message}")]
    InputValidation {
        /// The failing stage.
        stage: StageKind,
        /// What was wrong.
        message: String,
    },

    /// The provider did not accept the work submission.
    #[error("{stage} submission failed: {source}")]
    Submission {
        /// The failing stage.
        stage: StageKind,
        /// Transport failure.
        #[source]
        source: TransportError,
    },

    /// The text-generation call failed.
    #[error("{stage} generation failed: {source}")]
    Generation {
        /// The failing stage.
        stage: StageKind,
        /// Generation failure.
        #[source]
        source: GenerationError,
    },

    /// The remote task ended without a usable result.
    #[error("{stage}: {source}")]
    Task {
        /// The failing stage.
        stage: StageKind,
        /// Poller outcome.
        #[source]
        source: TaskError,
    },

    /// A synchronous response could not be parsed.
    #[error("{stage}: {source}")]
    ResponseShape {
        /// The failing stage.
        stage: StageKind,
        /// Decoder failure.
        #[source]
        source: ResponseShapeError,
    },
}

impl StageError {
    /// Creates an input validation error.
    #[must_use]
    pub fn input(stage: StageKind, message: impl Into<String>) -> Self {
        Self::InputValidation {
            stage,
            message: message.into(),
        }
    }

    /// Returns the stage that raised this error.
    #[must_use]
    pub fn stage(&self) -> StageKind {
        match self {
            Self::InputValidation { stage, .. }
            | Self::Submission { stage, .. }
            | Self::Generation { stage, .. }
            | Self::Task { stage, .. }
            | Self::ResponseShape { stage, .. } => *stage,
        }
    }

    /// Returns the failure category.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InputValidation { .. } => FailureKind::InputValidation,
            Self::Submission { .. } => FailureKind::ProviderTaskFailure,
            Self::Generation { source, .. } => match source {
                GenerationError::Transport(_) => FailureKind::ProviderTaskFailure,
                GenerationError::Shape(_) => FailureKind::ResponseShape,
            },
            Self::Task { source, .. } => source.kind(),
            Self::ResponseShape { .. } => FailureKind::ResponseShape,
        }
    }
}

/// Errors raised by the storage collaborator.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Downloading the final artifact failed.
    #[error("download of {url} failed: {source}")]
    Download {
        /// Artifact URL.
        url: String,
        /// Transport failure.
        #[source]
        source: TransportError,
    },

    /// No stored video with this id.
    #[error("video not found: {0}")]
    NotFound(String),

    /// Metadata could not be encoded or decoded.
    #[error("metadata serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the job registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No job with this id.
    #[error("job not found: {0}")]
    NotFound(String),

    /// A coordinator already owns this job.
    #[error("job {0} is already claimed by a coordinator")]
    AlreadyClaimed(String),

    /// The requested state change would move the job backwards or out of a
    /// terminal state.
    #[error("job {job_id}: invalid transition {from} -> {to}")]
    InvalidTransition {
        /// The job.
        job_id: String,
        /// Current state.
        from: String,
        /// Requested state.
        to: String,
    },
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required credentials are not set.
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingCredentials(Vec<String>),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// The document could not be parsed.
    #[error("configuration parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
