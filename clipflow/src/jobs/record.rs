//! Job records.

use super::failure::{FailureRecord, JobFailure};
use crate::core::{JobState, Scene, StageResult, VideoIdea};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Progress text on a freshly created job.
pub const PROGRESS_QUEUED: &str = "Initializing video generation...";
/// Progress text once the pipeline starts.
pub const PROGRESS_INITIALIZING: &str = "Initializing AI video generator...";
/// Progress text while the final artifact is stored.
pub const PROGRESS_SAVING: &str = "Downloading and saving final video...";
/// Progress text on completion.
pub const PROGRESS_COMPLETED: &str = "Video generation completed successfully!";

/// Unique, time-ordered job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generates a new id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parses either the display form (`job_<hex>`) or a plain UUID.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.strip_prefix("job_").unwrap_or(raw);
        Uuid::parse_str(raw).ok().map(Self)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job_{}", self.0.simple())
    }
}

/// Parameters of one generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInputs {
    /// Replaces the default concept request sent to ideation.
    #[serde(default)]
    pub custom_prompt: Option<String>,
    /// Whether to synthesize audio for the clips.
    #[serde(default = "default_include_sound")]
    pub include_sound: bool,
}

fn default_include_sound() -> bool {
    true
}

impl Default for JobInputs {
    fn default() -> Self {
        Self {
            custom_prompt: None,
            include_sound: default_include_sound(),
        }
    }
}

impl JobInputs {
    /// Creates default inputs (no custom prompt, with sound).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a custom ideation prompt.
    #[must_use]
    pub fn with_custom_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.custom_prompt = Some(prompt.into());
        self
    }

    /// Enables or disables audio synthesis.
    #[must_use]
    pub fn with_sound(mut self, include_sound: bool) -> Self {
        self.include_sound = include_sound;
        self
    }
}

/// Summary attached to a completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    /// Stored video identifier.
    pub video_id: String,
    /// Stored file name.
    pub filename: String,
    /// The idea the video realizes.
    pub idea: String,
    /// Caption for publishing.
    pub caption: String,
    /// Provider URL of the composed video.
    pub final_video_url: String,
    /// Path from which the stored video can be downloaded.
    pub download_url: String,
}

/// One generation request and everything known about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job identifier.
    pub id: JobId,
    /// Lifecycle state.
    pub state: JobState,
    /// Current stage description.
    pub progress: String,
    /// Request parameters.
    pub inputs: JobInputs,
    /// Stage results in completion order.
    pub stage_outputs: Vec<StageResult>,
    /// Failures that degraded the output without ending the job.
    pub tolerated_failures: Vec<FailureRecord>,
    /// First fatal cause; set only when failed.
    pub error: Option<JobFailure>,
    /// Completion summary; set only when completed.
    pub result: Option<JobResult>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub(crate) fn new(id: JobId, inputs: JobInputs) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: JobState::Created,
            progress: PROGRESS_QUEUED.to_string(),
            inputs,
            stage_outputs: Vec::new(),
            tolerated_failures: Vec::new(),
            error: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The idea, once ideation completed.
    #[must_use]
    pub fn idea(&self) -> Option<&VideoIdea> {
        self.stage_outputs.iter().find_map(|output| match output {
            StageResult::Idea(idea) => Some(idea),
            _ => None,
        })
    }

    /// The scenes, once scripting completed.
    #[must_use]
    pub fn scenes(&self) -> Option<&[Scene]> {
        self.stage_outputs.iter().find_map(|output| match output {
            StageResult::SceneList(scenes) => Some(scenes.as_slice()),
            _ => None,
        })
    }

    /// Clip URLs, once clip synthesis completed.
    #[must_use]
    pub fn clips(&self) -> Option<&[String]> {
        self.stage_outputs.iter().find_map(|output| match output {
            StageResult::ClipRefList(clips) => Some(clips.as_slice()),
            _ => None,
        })
    }

    /// Audio URLs per clip, once audio synthesis completed.
    #[must_use]
    pub fn audio(&self) -> Option<&[Option<String>]> {
        self.stage_outputs.iter().find_map(|output| match output {
            StageResult::AudioRefList(audio) => Some(audio.as_slice()),
            _ => None,
        })
    }

    /// Composed video URL, once composition completed.
    #[must_use]
    pub fn composed_url(&self) -> Option<&str> {
        self.stage_outputs.iter().find_map(|output| match output {
            StageResult::ComposedArtifactRef(url) => Some(url.as_str()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_job_id_display_and_parse() {
        let id = JobId::new();
        let shown = id.to_string();
        assert!(shown.starts_with("job_"));
        assert_eq!(shown.len(), 4 + 32);
        assert_eq!(JobId::parse(&shown), Some(id));
        assert_eq!(JobId::parse(&id.as_uuid().to_string()), Some(id));
        assert_eq!(JobId::parse("job_nope"), None);
    }

    #[test]
    fn test_job_ids_are_distinct_and_ordered() {
        let first = JobId::new();
        let second = JobId::new();
        assert_ne!(first, second);
        assert!(first < second);
    }

    #[test]
    fn test_inputs_defaults() {
        let inputs: JobInputs = serde_json::from_str("{}").unwrap();
        assert_eq!(inputs, JobInputs::new());
        assert!(inputs.include_sound);

        let inputs = JobInputs::new().with_custom_prompt("glass apple").with_sound(false);
        assert_eq!(inputs.custom_prompt.as_deref(), Some("glass apple"));
        assert!(!inputs.include_sound);
    }

    #[test]
    fn test_new_record() {
        let record = JobRecord::new(JobId::new(), JobInputs::new());
        assert_eq!(record.state, JobState::Created);
        assert_eq!(record.progress, PROGRESS_QUEUED);
        assert!(record.stage_outputs.is_empty());
        assert!(record.idea().is_none());
        assert!(record.error.is_none());
    }

    #[test]
    fn test_output_accessors() {
        let mut record = JobRecord::new(JobId::new(), JobInputs::new());
        record.stage_outputs.push(StageResult::ClipRefList(vec!["a".into(), "b".into()]));
        record.stage_outputs.push(StageResult::AudioRefList(vec![Some("s".into()), None]));
        assert_eq!(record.clips().map(<[String]>::len), Some(2));
        assert_eq!(record.audio().unwrap()[1], None);
        assert!(record.composed_url().is_none());
    }
}
