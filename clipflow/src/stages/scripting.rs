//! Scripting: one text request producing scene descriptions.

use super::Stage;
use crate::config::PromptConfig;
use crate::core::{Scene, StageKind, VideoIdea};
use crate::errors::StageError;
use crate::providers::{TextGenerator, TextRequest};
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};

#[allow(clippy::expect_used)]
static SCENE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?mi)^[\s*#>-]*scene\s+\d+\s*\**\s*:\s*(.+?)\s*$").expect("scene pattern is valid")
});

/// Asks the text model for scene descriptions of an idea.
pub struct ScriptingStage {
    generator: Arc<dyn TextGenerator>,
    prompts: PromptConfig,
    max_scenes: usize,
}

impl std::fmt::Debug for ScriptingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptingStage")
            .field("max_scenes", &self.max_scenes)
            .finish_non_exhaustive()
    }
}

impl ScriptingStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(generator: Arc<dyn TextGenerator>, prompts: PromptConfig, max_scenes: usize) -> Self {
        Self {
            generator,
            prompts,
            max_scenes,
        }
    }

    fn request(&self, idea: &VideoIdea) -> TextRequest {
        let user = self
            .prompts
            .scene_user
            .replace("{idea}", &idea.idea)
            .replace("{environment}", &idea.environment)
            .replace("{sound}", &idea.sound);
        TextRequest::new(&self.prompts.scene_system, user)
    }
}

#[async_trait]
impl Stage for ScriptingStage {
    type Input = VideoIdea;
    type Output = Vec<Scene>;

    fn kind(&self) -> StageKind {
        StageKind::Scripting
    }

    async fn execute(&self, idea: &VideoIdea) -> Result<Vec<Scene>, StageError> {
        let text = self
            .generator
            .generate(&self.request(idea))
            .await
            .map_err(|source| StageError::Generation {
                stage: StageKind::Scripting,
                source,
            })?;

        let mut scenes = parse_scenes(&text);
        if scenes.is_empty() {
            return Err(StageError::input(
                StageKind::Scripting,
                "no `Scene N:` lines found in the scene description response",
            ));
        }
        if scenes.len() > self.max_scenes {
            warn!(
                parsed = scenes.len(),
                used = self.max_scenes,
                "Dropping scenes beyond the configured maximum"
            );
            scenes.truncate(self.max_scenes);
        }
        info!(count = scenes.len(), "Generated scenes");
        Ok(scenes)
    }
}

/// Extracts `Scene N: "..."` lines, in order, with surrounding quotes removed.
#[must_use]
pub fn parse_scenes(text: &str) -> Vec<Scene> {
    SCENE_LINE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim_matches(|c: char| c == '"' || c == '*' || c.is_whitespace()))
        .filter(|description| !description.is_empty())
        .map(Scene::new)
        .collect()
}
