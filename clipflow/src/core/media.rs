//! Stage results and the media records they carry.

use serde::{Deserialize, Serialize};

/// Production status assigned to fresh ideas.
pub const DEFAULT_PRODUCTION_STATUS: &str = "for production";

fn default_production_status() -> String {
    DEFAULT_PRODUCTION_STATUS.to_string()
}

/// The concept a video is built around.
///
/// Field names accept both the capitalised keys the text model is asked to
/// emit and their lowercase forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoIdea {
    /// Short viral caption with hashtags.
    #[serde(rename = "Caption", alias = "caption")]
    pub caption: String,
    /// The idea itself.
    #[serde(rename = "Idea", alias = "idea")]
    pub idea: String,
    /// Setting description shared by every scene.
    #[serde(rename = "Environment", alias = "environment")]
    pub environment: String,
    /// Primary sound description, fed to audio synthesis.
    #[serde(rename = "Sound", alias = "sound")]
    pub sound: String,
    /// Production status.
    #[serde(
        rename = "Status",
        alias = "status",
        default = "default_production_status"
    )]
    pub status: String,
}

/// One scene description produced by scripting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    /// Visual description of the scene.
    pub description: String,
}

impl Scene {
    /// Creates a scene.
    #[must_use]
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }
}

/// The successful output of a remote task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Provider task that produced it.
    pub task_id: String,
    /// Where the result can be fetched.
    pub url: String,
}

impl Artifact {
    /// Creates an artifact.
    #[must_use]
    pub fn new(task_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            url: url.into(),
        }
    }
}

/// Output of one pipeline stage, accumulated on the job record in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "value", rename_all = "snake_case")]
pub enum StageResult {
    /// Ideation output.
    Idea(VideoIdea),
    /// Scripting output.
    SceneList(Vec<Scene>),
    /// Clip URLs in scene order.
    ClipRefList(Vec<String>),
    /// Audio URLs in clip order; `None` marks a clip without sound.
    AudioRefList(Vec<Option<String>>),
    /// Final composed video URL.
    ComposedArtifactRef(String),
}

impl StageResult {
    /// Returns the stage that produced this result.
    #[must_use]
    pub fn stage(&self) -> super::StageKind {
        use super::StageKind;
        match self {
            Self::Idea(_) => StageKind::Ideation,
            Self::SceneList(_) => StageKind::Scripting,
            Self::ClipRefList(_) => StageKind::ClipSynthesis,
            Self::AudioRefList(_) => StageKind::AudioSynthesis,
            Self::ComposedArtifactRef(_) => StageKind::Composition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageKind;

    #[test]
    fn test_idea_accepts_model_keys() {
        let json = r#"{"Caption":"c","Idea":"i","Environment":"e","Sound":"s","Status":"for production"}"#;
        let idea: VideoIdea = serde_json::from_str(json).unwrap();
        assert_eq!(idea.idea, "i");
        assert_eq!(idea.status, "for production");
    }

    #[test]
    fn test_idea_status_defaults() {
        let json = r#"{"caption":"c","idea":"i","environment":"e","sound":"s"}"#;
        let idea: VideoIdea = serde_json::from_str(json).unwrap();
        assert_eq!(idea.status, DEFAULT_PRODUCTION_STATUS);
    }

    #[test]
    fn test_stage_result_tagging() {
        let result = StageResult::AudioRefList(vec![Some("a".to_string()), None]);
        assert_eq!(result.stage(), StageKind::AudioSynthesis);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["stage"], "audio_ref_list");
        assert_eq!(json["value"][1], serde_json::Value::Null);
    }
}
