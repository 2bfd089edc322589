//! Core domain model types for clipflow.
//!
//! This module contains the fundamental types used throughout the engine:
//! - Job state and normalized remote task status
//! - Pipeline stage kinds and their failure policies
//! - Stage results and the media records they carry

mod media;
mod stage;
mod status;

pub use media::{Artifact, Scene, StageResult, VideoIdea};
pub use stage::{FailurePolicy, StageKind};
pub use status::{JobState, TaskStatus};
