//! Clip synthesis: one remote video task per scene.

use super::Stage;
use crate::config::VideoConfig;
use crate::core::{Scene, StageKind, VideoIdea};
use crate::errors::StageError;
use crate::observability::StageTimer;
use crate::poller::TaskPoller;
use crate::providers::{QueueClient, QueueEndpoint};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

/// Input of clip synthesis.
#[derive(Debug, Clone)]
pub struct ClipInput {
    /// The video concept.
    pub idea: VideoIdea,
    /// Scenes to render, in order.
    pub scenes: Vec<Scene>,
}

/// Builds the prompt for one scene.
#[must_use]
pub fn clip_prompt(idea: &VideoIdea, scene: &Scene) -> String {
    format!(
        "VIDEO THEME: {} | WHAT HAPPENS IN THE VIDEO: {} | WHERE THE VIDEO IS SHOT: {}",
        idea.idea, scene.description, idea.environment
    )
}

/// Renders every scene into a clip, sequentially.
#[derive(Debug, Clone)]
pub struct ClipSynthesisStage {
    client: QueueClient,
    poller: TaskPoller,
    endpoint: QueueEndpoint,
    aspect_ratio: String,
    clip_duration_secs: u32,
    max_wait: Duration,
}

impl ClipSynthesisStage {
    /// Creates the stage.
    #[must_use]
    pub fn new(
        client: QueueClient,
        poller: TaskPoller,
        endpoint: QueueEndpoint,
        video: &VideoConfig,
        max_wait: Duration,
    ) -> Self {
        Self {
            client,
            poller,
            endpoint,
            aspect_ratio: video.aspect_ratio.clone(),
            clip_duration_secs: video.clip_duration_secs,
            max_wait,
        }
    }

    fn payload(&self, prompt: String) -> Value {
        json!({
            "aspect_ratio": self.aspect_ratio,
            "duration": self.clip_duration_secs,
            "prompt": prompt,
        })
    }
}

#[async_trait]
impl Stage for ClipSynthesisStage {
    type Input = ClipInput;
    type Output = Vec<String>;

    fn kind(&self) -> StageKind {
        StageKind::ClipSynthesis
    }

    async fn execute(&self, input: &ClipInput) -> Result<Vec<String>, StageError> {
        let total = input.scenes.len();
        let mut clips = Vec::with_capacity(total);

        for (index, scene) in input.scenes.iter().enumerate() {
            let timer = StageTimer::start(format!("clip {}/{total}", index + 1));
            let payload = self.payload(clip_prompt(&input.idea, scene));
            let task = self
                .client
                .submit(StageKind::ClipSynthesis, &self.endpoint, &payload)
                .await?
                .with_label(format!("clip {}", index + 1));

            let artifact = self
                .poller
                .await_completion(&task, self.max_wait)
                .await
                .map_err(|source| StageError::Task {
                    stage: StageKind::ClipSynthesis,
                    source,
                })?;

            info!(
                clip = index + 1,
                total,
                url = %artifact.url,
                elapsed_s = timer.finish().as_secs(),
                "Clip generated"
            );
            clips.push(artifact.url);
        }

        Ok(clips)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::BackoffConfig;
    use crate::providers::{Credential, HttpReply};
    use crate::testing::{fixtures, ScriptedTransport};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn stage(transport: &Arc<ScriptedTransport>) -> ClipSynthesisStage {
        let endpoint = QueueEndpoint::new(
            fixtures::VIDEO_SUBMIT_URL,
            fixtures::VIDEO_STATUS_TEMPLATE,
            crate::poller::ProviderDialect::Prediction,
            Credential::Anonymous,
        );
        ClipSynthesisStage::new(
            QueueClient::new(transport.clone()),
            TaskPoller::new(transport.clone(), BackoffConfig::default()),
            endpoint,
            &VideoConfig::default(),
            Duration::from_secs(300),
        )
    }

    #[test]
    fn test_clip_prompt() {
        let idea = fixtures::idea();
        let prompt = clip_prompt(&idea, &Scene::new("The blade enters"));
        assert_eq!(
            prompt,
            format!(
                "VIDEO THEME: {} | WHAT HAPPENS IN THE VIDEO: The blade enters | WHERE THE VIDEO IS SHOT: {}",
                idea.idea, idea.environment
            )
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_clips_in_scene_order() {
        let transport = Arc::new(ScriptedTransport::new());
        fixtures::script_clip(&transport, "c1", "https://cdn/c1.mp4");
        fixtures::script_clip(&transport, "c2", "https://cdn/c2.mp4");

        let input = ClipInput {
            idea: fixtures::idea(),
            scenes: vec![Scene::new("one"), Scene::new("two")],
        };
        let clips = stage(&transport).execute(&input).await.unwrap();
        assert_eq!(clips, vec!["https://cdn/c1.mp4", "https://cdn/c2.mp4"]);

        let submissions = transport.posts_to(fixtures::VIDEO_SUBMIT_URL);
        assert_eq!(submissions.len(), 2);
        assert_eq!(submissions[0]["aspect_ratio"], "9:16");
        assert_eq!(submissions[0]["duration"], 10);
        assert!(submissions[1]["prompt"].as_str().unwrap().contains("WHAT HAPPENS IN THE VIDEO: two"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clip_failure_stops_stage() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_post(
            fixtures::VIDEO_SUBMIT_URL,
            HttpReply::ok(json!({"data": {"id": "c1"}})),
        );
        transport.on_get(
            &fixtures::video_status_url("c1"),
            HttpReply::ok(json!({"data": {"status": "failed", "error": "policy"}})),
        );

        let input = ClipInput {
            idea: fixtures::idea(),
            scenes: vec![Scene::new("one"), Scene::new("two")],
        };
        let err = stage(&transport).execute(&input).await.unwrap_err();
        assert_eq!(err.stage(), StageKind::ClipSynthesis);
        assert_eq!(transport.posts_to(fixtures::VIDEO_SUBMIT_URL).len(), 1);
    }
}
