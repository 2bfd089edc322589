//! Ideation: one text request producing the video concept.

use super::Stage;
use crate::config::PromptConfig;
use crate::core::{StageKind, VideoIdea};
use crate::errors::{ResponseShapeError, StageError};
use crate::jobs::JobInputs;
use crate::providers::{TextGenerator, TextRequest};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Asks the text model for one idea.
pub struct IdeationStage {
    generator: Arc<dyn TextGenerator>,
    prompts: PromptConfig,
}

impl std::fmt::Debug for IdeationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdeationStage").finish_non_exhaustive()
    }
}

impl IdeationStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, prompts: PromptConfig) -> Self {
        Self { generator, prompts }
    }

    fn request(&self, inputs: &JobInputs) -> TextRequest {
        let user = inputs
            .custom_prompt
            .as_deref()
            .map(str::trim)
            .filter(|prompt| !prompt.is_empty())
            .unwrap_or(&self.prompts.idea_user);
        TextRequest::new(&self.prompts.idea_system, user)
    }
}

#[async_trait]
impl Stage for IdeationStage {
    type Input = JobInputs;
    type Output = VideoIdea;

    fn kind(&self) -> StageKind {
        StageKind::Ideation
    }

    async fn execute(&self, inputs: &JobInputs) -> Result<VideoIdea, StageError> {
        let text = self
            .generator
            .generate(&self.request(inputs))
            .await
            .map_err(|source| StageError::Generation {
                stage: StageKind::Ideation,
                source,
            })?;

        let idea = parse_idea(&text).map_err(|source| StageError::ResponseShape {
            stage: StageKind::Ideation,
            source,
        })?;
        info!(idea = %idea.idea, "Generated idea");
        Ok(idea)
    }
}

/// Parses the model's answer: a JSON array holding one idea object,
/// optionally fenced in a markdown code block. A bare object is accepted too.
pub fn parse_idea(text: &str) -> Result<VideoIdea, ResponseShapeError> {
    let body = strip_code_fence(text);
    let value: Value = serde_json::from_str(body)
        .map_err(|e| ResponseShapeError::new("idea", format!("not valid JSON: {e}")))?;

    let object = match value {
        Value::Array(mut items) => {
            if items.is_empty() {
                return Err(ResponseShapeError::new("idea", "empty idea array"));
            }
            if items.len() > 1 {
                warn!(count = items.len(), "Model returned several ideas, using the first");
            }
            items.swap_remove(0)
        }
        object @ Value::Object(_) => object,
        other => {
            return Err(ResponseShapeError::new(
                "idea",
                format!("expected an array of idea objects, got {other}"),
            ))
        }
    };

    serde_json::from_value(object)
        .map_err(|e| ResponseShapeError::new("idea", format!("malformed idea object: {e}")))
}

fn strip_code_fence(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```") {
        body = rest.strip_prefix("json").unwrap_or(rest);
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    body.trim()
}
