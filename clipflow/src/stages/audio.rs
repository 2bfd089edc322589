//! Audio synthesis: one remote sound task per clip, failures tolerated.

use super::Stage;
use crate::core::StageKind;
use crate::errors::StageError;
use crate::jobs::FailureRecord;
use crate::poller::TaskPoller;
use crate::providers::{QueueClient, QueueEndpoint};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

/// Input of audio synthesis.
#[derive(Debug, Clone)]
pub struct AudioInput {
    /// Sound description from the idea.
    pub sound: String,
    /// Clip URLs, in order.
    pub clips: Vec<String>,
}

/// Output of audio synthesis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioOutcome {
    /// One entry per clip; `None` where synthesis failed.
    pub tracks: Vec<Option<String>>,
    /// The failures behind the `None` entries.
    pub failures: Vec<FailureRecord>,
}

impl AudioOutcome {
    /// An outcome with no audio for `clips` clips.
    #[must_use]
    pub fn silent(clips: usize) -> Self {
        Self {
            tracks: vec![None; clips],
            failures: Vec::new(),
        }
    }

    /// Whether any clip has audio.
    #[must_use]
    pub fn has_audio(&self) -> bool {
        self.tracks.iter().any(Option::is_some)
    }
}

/// Adds a sound track to every clip, sequentially.
#[derive(Debug, Clone)]
pub struct AudioSynthesisStage {
    client: QueueClient,
    poller: TaskPoller,
    endpoint: QueueEndpoint,
    prompt_prefix: String,
    duration_secs: u32,
    max_wait: Duration,
}

impl AudioSynthesisStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(
        client: QueueClient,
        poller: TaskPoller,
        endpoint: QueueEndpoint,
        prompt_prefix: impl Into<String>,
        duration_secs: u32,
        max_wait: Duration,
    ) -> Self {
        Self {
            client,
            poller,
            endpoint,
            prompt_prefix: prompt_prefix.into(),
            duration_secs,
            max_wait,
        }
    }

    async fn synthesize(&self, index: usize, sound: &str, clip_url: &str) -> Result<String, StageError> {
        let payload = json!({
            "prompt": format!("{} {sound}", self.prompt_prefix),
            "duration": self.duration_secs,
            "video_url": clip_url,
        });
        let task = self
            .client
            .submit(StageKind::AudioSynthesis, &self.endpoint, &payload)
            .await?
            .with_label(format!("sound {}", index + 1));

        self.poller
            .await_completion(&task, self.max_wait)
            .await
            .map(|artifact| artifact.url)
            .map_err(|source| StageError::Task {
                stage: StageKind::AudioSynthesis,
                source,
            })
    }
}

#[async_trait]
impl Stage for AudioSynthesisStage {
    type Input = AudioInput;
    type Output = AudioOutcome;

    fn kind(&self) -> StageKind {
        StageKind::AudioSynthesis
    }

    /// Never fails: per-clip errors become `None` plus a failure record.
    async fn execute(&self, input: &AudioInput) -> Result<AudioOutcome, StageError> {
        let mut outcome = AudioOutcome::default();

        for (index, clip_url) in input.clips.iter().enumerate() {
            match self.synthesize(index, &input.sound, clip_url).await {
                Ok(url) => {
                    info!(clip = index + 1, url = %url, "Sound generated");
                    outcome.tracks.push(Some(url));
                }
                Err(err) => {
                    warn!(clip = index + 1, error = %err, "Sound generation failed, continuing without audio");
                    outcome.failures.push(FailureRecord::from_error(&err).with_index(index));
                    outcome.tracks.push(None);
                }
            }
        }

        Ok(outcome)
    }
}
