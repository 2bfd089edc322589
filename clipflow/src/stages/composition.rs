//! Composition: one remote task stitching clips and audio together.

use super::Stage;
use crate::core::StageKind;
use crate::errors::StageError;
use crate::poller::TaskPoller;
use crate::providers::{QueueClient, QueueEndpoint};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

/// Input of composition.
#[derive(Debug, Clone)]
pub struct CompositionInput {
    /// Clip URLs, in order.
    pub clips: Vec<String>,
    /// Audio per clip; same length as `clips`.
    pub audio: Vec<Option<String>>,
}

/// Builds the composition request: clips back to back, each `clip_secs`
/// long, plus an audio track only when at least one clip has audio.
#[must_use]
pub fn build_composition_request(clips: &[String], audio: &[Option<String>], clip_secs: u32) -> Value {
    let slot = |index: usize| u64::from(clip_secs) * index as u64;

    let video_keyframes: Vec<Value> = clips
        .iter()
        .enumerate()
        .map(|(i, url)| json!({"url": url, "timestamp": slot(i), "duration": clip_secs}))
        .collect();

    let audio_keyframes: Vec<Value> = audio
        .iter()
        .enumerate()
        .filter_map(|(i, url)| url.as_ref().map(|url| (i, url)))
        .map(|(i, url)| json!({"url": url, "timestamp": slot(i), "duration": clip_secs}))
        .collect();

    let mut tracks = vec![json!({"id": "1", "type": "video", "keyframes": video_keyframes})];
    if !audio_keyframes.is_empty() {
        tracks.push(json!({"id": "2", "type": "audio", "keyframes": audio_keyframes}));
    }
    json!({ "tracks": tracks })
}

/// Merges the clips into the final video.
#[derive(Debug, Clone)]
pub struct CompositionStage {
    client: QueueClient,
    poller: TaskPoller,
    endpoint: QueueEndpoint,
    clip_secs: u32,
    max_wait: Duration,
}

impl CompositionStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(
        client: QueueClient,
        poller: TaskPoller,
        endpoint: QueueEndpoint,
        clip_secs: u32,
        max_wait: Duration,
    ) -> Self {
        Self {
            client,
            poller,
            endpoint,
            clip_secs,
            max_wait,
        }
    }
}

#[async_trait]
impl Stage for CompositionStage {
    type Input = CompositionInput;
    type Output = String;

    fn kind(&self) -> StageKind {
        StageKind::Composition
    }

    async fn execute(&self, input: &CompositionInput) -> Result<String, StageError> {
        if input.clips.is_empty() {
            return Err(StageError::input(StageKind::Composition, "no clips to compose"));
        }
        if input.audio.len() != input.clips.len() {
            return Err(StageError::input(
                StageKind::Composition,
                format!(
                    "{} audio entries for {} clips",
                    input.audio.len(),
                    input.clips.len()
                ),
            ));
        }

        let request = build_composition_request(&input.clips, &input.audio, self.clip_secs);
        let task = self
            .client
            .submit(StageKind::Composition, &self.endpoint, &request)
            .await?
            .with_label("composition");

        let artifact = self
            .poller
            .await_completion(&task, self.max_wait)
            .await
            .map_err(|source| StageError::Task {
                stage: StageKind::Composition,
                source,
            })?;

        info!(url = %artifact.url, "Final video composed");
        Ok(artifact.url)
    }
}
