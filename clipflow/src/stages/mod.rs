//! Stage executors.
//!
//! Each executor wraps one provider contract: it builds the outbound request
//! from job-relevant inputs, submits it, awaits the remote task when there is
//! one, and returns a typed result.

mod audio;
mod clips;
mod composition;
mod ideation;
mod scripting;

use crate::core::StageKind;
use crate::errors::StageError;
use async_trait::async_trait;
use std::fmt::Debug;

pub use audio::{AudioInput, AudioOutcome, AudioSynthesisStage};
pub use clips::{clip_prompt, ClipInput, ClipSynthesisStage};
pub use composition::{build_composition_request, CompositionInput, CompositionStage};
pub use ideation::{parse_idea, IdeationStage};
pub use scripting::{parse_scenes, ScriptingStage};

/// A pipeline stage.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// What the stage consumes.
    type Input: Send + Sync;
    /// What the stage produces.
    type Output: Send;

    /// Returns the stage kind.
    fn kind(&self) -> StageKind;

    /// Executes the stage.
    async fn execute(&self, input: &Self::Input) -> Result<Self::Output, StageError>;
}
