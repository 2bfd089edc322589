//! # Clipflow
//!
//! Job orchestration engine for multi-stage generative video pipelines.
//!
//! A job turns a topic into a short video by chaining slow, asynchronous
//! remote providers:
//!
//! - **Ideation** and **Scripting**: one text-generation call each
//! - **Clip Synthesis**: one remote video task per scene
//! - **Audio Synthesis**: one remote sound task per clip; failures tolerated
//! - **Composition**: one remote task stitching clips and sound together
//!
//! Remote tasks are awaited by a generic [`poller::TaskPoller`] with capped
//! linear backoff. Every job is tracked in a [`jobs::JobRegistry`] and runs in
//! its own tokio task, written to by exactly one coordinator.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use clipflow::prelude::*;
//!
//! init_tracing(LogFormat::Pretty);
//! let config = ClipflowConfig::default();
//! let service = VideoJobService::from_config(&config, &Credentials::from_env()?)?;
//!
//! let job_id = service.submit(service.default_inputs());
//! let snapshot = service.inspect(&job_id);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod jobs;
pub mod observability;
pub mod pipeline;
pub mod poller;
pub mod providers;
pub mod stages;
pub mod storage;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{ClipflowConfig, Credentials, PollingConfig};
    pub use crate::core::{JobState, Scene, StageKind, StageResult, TaskStatus, VideoIdea};
    pub use crate::errors::{
        ClipflowError, FailureKind, StageError, StorageError, TaskError, TransportError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::jobs::{JobFailure, JobId, JobInputs, JobRecord, JobRegistry, JobResult};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{PipelineCoordinator, PipelineStages, VideoJobService};
    pub use crate::poller::{BackoffConfig, ProviderDialect, RemoteTask, TaskPoller};
    pub use crate::stages::Stage;
    pub use crate::storage::{ArtifactStore, LocalArtifactStore, VideoMetadata};
}
