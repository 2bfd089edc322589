//! End-to-end pipeline runs against scripted providers.

use super::{download_path, VideoJobService};
use crate::config::ClipflowConfig;
use crate::core::{JobState, StageKind};
use crate::errors::{ClipflowError, FailureKind, GenerationError, StorageError, TransportError};
use crate::events::{
    CollectingEventSink, EventSink, JOB_COMPLETED, JOB_FAILED, JOB_STARTED, STAGE_COMPLETED,
    STAGE_STARTED, STAGE_TOLERATED_FAILURE,
};
use crate::jobs::{JobInputs, JobRecord, PROGRESS_COMPLETED};
use crate::providers::{HttpReply, HttpTransport, TextGenerator};
use crate::storage::{ArtifactStore, MockArtifactStore};
use crate::testing::{fixtures, MemoryArtifactStore, ScriptedTextGenerator, ScriptedTransport};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

struct Harness {
    transport: Arc<ScriptedTransport>,
    text: Arc<ScriptedTextGenerator>,
    store: Arc<MemoryArtifactStore>,
    events: Arc<CollectingEventSink>,
    service: VideoJobService,
}

impl Harness {
    fn new(config: &ClipflowConfig) -> Self {
        let store = Arc::new(MemoryArtifactStore::new());
        Self::with_store(config, Arc::clone(&store) as Arc<dyn ArtifactStore>, store)
    }

    fn with_store(
        config: &ClipflowConfig,
        artifacts: Arc<dyn ArtifactStore>,
        store: Arc<MemoryArtifactStore>,
    ) -> Self {
        let transport = Arc::new(ScriptedTransport::new());
        let text = Arc::new(ScriptedTextGenerator::new());
        let events = Arc::new(CollectingEventSink::new());
        let service = VideoJobService::with_components(
            config,
            &fixtures::credentials(),
            Arc::clone(&transport) as Arc<dyn HttpTransport>,
            Arc::clone(&text) as Arc<dyn TextGenerator>,
            artifacts,
            Arc::clone(&events) as Arc<dyn EventSink>,
        );
        Self {
            transport,
            text,
            store,
            events,
            service,
        }
    }

    /// Scripts the text answers and `clips` clips named `{tag}-v{n}`.
    fn script_through_clips(&self, tag: &str, clips: usize) {
        self.text.push_reply(fixtures::idea_json());
        self.text.push_reply(fixtures::scenes_text(clips));
        for n in 1..=clips {
            fixtures::script_clip(
                &self.transport,
                &format!("{tag}-v{n}"),
                &format!("https://cdn.test/{tag}/clip{n}.mp4"),
            );
        }
    }

    fn script_sounds(&self, tag: &str, clips: usize) {
        for n in 1..=clips {
            fixtures::script_audio(
                &self.transport,
                &format!("{tag}-a{n}"),
                &format!("https://cdn.test/{tag}/sound{n}.mp4"),
            );
        }
    }

    fn script_composition(&self, tag: &str) -> String {
        let url = format!("https://cdn.test/{tag}/final.mp4");
        fixtures::script_composition(&self.transport, &format!("{tag}-m"), &url);
        url
    }

    async fn run(&self, inputs: JobInputs) -> JobRecord {
        let (_, handle) = self.service.spawn(inputs);
        handle.await.unwrap()
    }
}

fn clip_url(tag: &str, n: usize) -> String {
    format!("https://cdn.test/{tag}/clip{n}.mp4")
}

fn sound_url(tag: &str, n: usize) -> String {
    format!("https://cdn.test/{tag}/sound{n}.mp4")
}

#[tokio::test(start_paused = true)]
async fn test_full_pipeline_completes() {
    let harness = Harness::new(&fixtures::test_config());
    harness.script_through_clips("j1", 3);
    harness.script_sounds("j1", 3);
    let final_url = harness.script_composition("j1");

    let record = harness.run(JobInputs::new()).await;

    assert_eq!(record.state, JobState::Completed);
    assert_eq!(record.progress, PROGRESS_COMPLETED);
    assert!(record.error.is_none());
    assert_eq!(record.stage_outputs.len(), 5);
    assert_eq!(record.idea(), Some(&fixtures::idea()));
    assert_eq!(record.scenes().map(<[_]>::len), Some(3));
    assert_eq!(
        record.clips().unwrap(),
        &[clip_url("j1", 1), clip_url("j1", 2), clip_url("j1", 3)]
    );
    assert_eq!(record.audio().unwrap().len(), record.clips().unwrap().len());
    assert_eq!(record.composed_url(), Some(final_url.as_str()));

    let video_id = record.id.to_string();
    let result = record.result.clone().unwrap();
    assert_eq!(result.video_id, video_id);
    assert_eq!(result.filename, format!("{video_id}.mp4"));
    assert_eq!(result.final_video_url, final_url);
    assert_eq!(result.download_url, download_path(&video_id));
    assert_eq!(result.caption, fixtures::idea().caption);

    assert_eq!(harness.store.ids(), vec![video_id.clone()]);
    assert_eq!(harness.store.source_url(&video_id), Some(final_url.clone()));
    let stored = harness.service.stored_video(&video_id).await.unwrap();
    assert_eq!(stored.metadata.scenes.len(), 3);
    assert!(stored.metadata.include_sound);
    assert_eq!(stored.metadata.status, "for production");

    let compose = harness.transport.posts_to(fixtures::COMPOSE_SUBMIT_URL);
    assert_eq!(compose.len(), 1);
    let tracks = compose[0]["tracks"].as_array().unwrap();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0]["keyframes"][2]["timestamp"], 20);
    assert_eq!(tracks[1]["type"], "audio");

    assert_eq!(harness.service.stats().active, 0);
    assert_eq!(harness.service.stats().total, 1);
}

#[tokio::test(start_paused = true)]
async fn test_audio_failure_on_one_clip_is_tolerated() {
    let harness = Harness::new(&fixtures::test_config());
    harness.script_through_clips("j2", 3);
    fixtures::script_audio(&harness.transport, "j2-a1", &sound_url("j2", 1));
    harness.transport.on_post(
        fixtures::AUDIO_SUBMIT_URL,
        HttpReply::ok(json!({"request_id": "j2-a2"})),
    );
    harness.transport.on_get(
        &fixtures::audio_status_url("j2-a2"),
        HttpReply::ok(json!({"status": "FAILED", "error": "audio model unavailable"})),
    );
    fixtures::script_audio(&harness.transport, "j2-a3", &sound_url("j2", 3));
    harness.script_composition("j2");

    let record = harness.run(JobInputs::new()).await;

    assert_eq!(record.state, JobState::Completed);
    let expected = vec![Some(sound_url("j2", 1)), None, Some(sound_url("j2", 3))];
    assert_eq!(record.audio().unwrap(), expected.as_slice());

    assert_eq!(record.tolerated_failures.len(), 1);
    let failure = &record.tolerated_failures[0];
    assert_eq!(failure.stage, StageKind::AudioSynthesis);
    assert_eq!(failure.index, Some(1));
    assert_eq!(failure.kind, FailureKind::ProviderTaskFailure);
    assert!(failure.error.contains("audio model unavailable"));

    let stored = harness.service.stored_video(&record.id.to_string()).await.unwrap();
    assert_eq!(stored.metadata.sound_urls, expected);

    let compose = harness.transport.posts_to(fixtures::COMPOSE_SUBMIT_URL);
    let audio_keyframes = compose[0]["tracks"][1]["keyframes"].as_array().unwrap();
    assert_eq!(audio_keyframes.len(), 2);
    assert_eq!(audio_keyframes[0]["timestamp"], 0);
    assert_eq!(audio_keyframes[1]["timestamp"], 20);

    let tolerated = harness.events.events_of_type(STAGE_TOLERATED_FAILURE);
    assert_eq!(tolerated.len(), 1);
    assert_eq!(tolerated[0].1.as_ref().unwrap()["index"], 1);
}

#[tokio::test(start_paused = true)]
async fn test_zero_scenes_fails_before_remote_work() {
    let harness = Harness::new(&fixtures::test_config());
    harness.text.push_reply(fixtures::idea_json());
    harness.text.push_reply("I could not come up with any scenes.");

    let record = harness.run(JobInputs::new()).await;

    assert_eq!(record.state, JobState::Failed);
    let error = record.error.clone().unwrap();
    assert_eq!(error.kind, FailureKind::InputValidation);
    assert_eq!(error.stage, Some(StageKind::Scripting));
    assert!(record.progress.starts_with("Generation failed:"));
    assert!(record.result.is_none());
    assert!(harness.transport.posts_to(fixtures::VIDEO_SUBMIT_URL).is_empty());
    assert!(harness.store.ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_malformed_idea_is_fatal() {
    let harness = Harness::new(&fixtures::test_config());
    harness.text.push_reply("Sure! Here is a great idea: apples.");

    let record = harness.run(JobInputs::new()).await;

    assert_eq!(record.state, JobState::Failed);
    let error = record.error.unwrap();
    assert_eq!(error.kind, FailureKind::ResponseShape);
    assert_eq!(error.stage, Some(StageKind::Ideation));
    assert_eq!(harness.text.requests().len(), 1);
}

#[tokio::test]
async fn test_unreachable_text_provider_fails_ideation() {
    let harness = Harness::new(&fixtures::test_config());
    harness.text.push_error(GenerationError::Transport(TransportError::connection(
        fixtures::TEXT_URL,
        "connection refused",
    )));

    let record = harness.run(JobInputs::new()).await;

    assert_eq!(record.state, JobState::Failed);
    let error = record.error.unwrap();
    assert_eq!(error.kind, FailureKind::ProviderTaskFailure);
    assert_eq!(error.stage, Some(StageKind::Ideation));
    assert!(error.message.contains("connection refused"));
    assert!(harness.transport.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sound_disabled_composes_video_only() {
    let harness = Harness::new(&fixtures::test_config());
    harness.script_through_clips("j3", 3);
    harness.script_composition("j3");

    let record = harness.run(JobInputs::new().with_sound(false)).await;

    assert_eq!(record.state, JobState::Completed);
    assert_eq!(record.audio().unwrap(), vec![None::<String>; 3].as_slice());
    assert!(harness.transport.posts_to(fixtures::AUDIO_SUBMIT_URL).is_empty());

    let compose = harness.transport.posts_to(fixtures::COMPOSE_SUBMIT_URL);
    let tracks = compose[0]["tracks"].as_array().unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0]["type"], "video");

    let stored = harness.service.stored_video(&record.id.to_string()).await.unwrap();
    assert!(!stored.metadata.include_sound);
}

#[tokio::test(start_paused = true)]
async fn test_all_audio_failing_still_completes_without_audio_track() {
    let harness = Harness::new(&fixtures::test_config());
    harness.script_through_clips("j4", 2);
    for _ in 0..2 {
        harness.transport.on_post(
            fixtures::AUDIO_SUBMIT_URL,
            HttpReply::new(503, json!({"detail": "service unavailable"})),
        );
    }
    harness.script_composition("j4");

    let record = harness.run(JobInputs::new()).await;

    assert_eq!(record.state, JobState::Completed);
    assert_eq!(record.audio().unwrap(), vec![None::<String>; 2].as_slice());
    assert_eq!(record.tolerated_failures.len(), 2);
    let compose = harness.transport.posts_to(fixtures::COMPOSE_SUBMIT_URL);
    assert_eq!(compose[0]["tracks"].as_array().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_clip_failure_is_fatal() {
    let harness = Harness::new(&fixtures::test_config());
    harness.text.push_reply(fixtures::idea_json());
    harness.text.push_reply(fixtures::scenes_text(3));
    fixtures::script_clip(&harness.transport, "j5-v1", &clip_url("j5", 1));
    harness.transport.on_post(
        fixtures::VIDEO_SUBMIT_URL,
        HttpReply::ok(json!({"data": {"id": "j5-v2", "status": "created"}})),
    );
    harness.transport.on_get(
        &fixtures::video_status_url("j5-v2"),
        HttpReply::ok(json!({"data": {"status": "failed", "error": "content policy"}})),
    );

    let record = harness.run(JobInputs::new()).await;

    assert_eq!(record.state, JobState::Failed);
    let error = record.error.clone().unwrap();
    assert_eq!(error.kind, FailureKind::ProviderTaskFailure);
    assert_eq!(error.stage, Some(StageKind::ClipSynthesis));
    assert!(error.message.contains("content policy"));
    assert_eq!(harness.transport.posts_to(fixtures::VIDEO_SUBMIT_URL).len(), 2);
    assert!(harness.transport.posts_to(fixtures::AUDIO_SUBMIT_URL).is_empty());
    assert!(harness.transport.posts_to(fixtures::COMPOSE_SUBMIT_URL).is_empty());
    assert!(record.clips().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_clip_timeout_is_fatal() {
    let config = fixtures::test_config().with_polling(crate::config::PollingConfig {
        initial_interval_ms: 1_000,
        increment_ms: 0,
        max_interval_ms: 1_000,
        max_wait_secs: 3,
    });
    let harness = Harness::new(&config);
    harness.text.push_reply(fixtures::idea_json());
    harness.text.push_reply(fixtures::scenes_text(1));
    harness.transport.on_post(
        fixtures::VIDEO_SUBMIT_URL,
        HttpReply::ok(json!({"data": {"id": "j6-v1"}})),
    );
    let status = fixtures::video_status_url("j6-v1");
    for _ in 0..10 {
        harness
            .transport
            .on_get(&status, HttpReply::ok(json!({"data": {"status": "processing"}})));
    }

    let record = harness.run(JobInputs::new()).await;

    assert_eq!(record.state, JobState::Failed);
    assert_eq!(record.error.unwrap().kind, FailureKind::Timeout);
}

#[tokio::test(start_paused = true)]
async fn test_storage_failure_fails_job() {
    let mut mock = MockArtifactStore::new();
    mock.expect_persist().times(1).returning(|_, url, _| {
        Err(StorageError::Download {
            url: url.to_string(),
            source: TransportError::status(url, 404, "gone"),
        })
    });
    let harness = Harness::with_store(
        &fixtures::test_config(),
        Arc::new(mock),
        Arc::new(MemoryArtifactStore::new()),
    );
    harness.script_through_clips("j7", 1);
    harness.script_sounds("j7", 1);
    harness.script_composition("j7");

    let record = harness.run(JobInputs::new()).await;

    assert_eq!(record.state, JobState::Failed);
    let error = record.error.clone().unwrap();
    assert_eq!(error.kind, FailureKind::Storage);
    assert_eq!(error.stage, None);
    assert!(record.composed_url().is_some());
    assert!(record.result.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_custom_prompt_reaches_ideation() {
    let harness = Harness::new(&fixtures::test_config());
    harness.text.push_reply(fixtures::idea_json());
    harness.text.push_reply(fixtures::scenes_text(0));

    harness
        .run(JobInputs::new().with_custom_prompt("Give me one idea about glass fruit"))
        .await;

    let requests = harness.text.requests();
    assert_eq!(requests[0].user, "Give me one idea about glass fruit");
}

#[tokio::test(start_paused = true)]
async fn test_identical_submissions_get_distinct_jobs() {
    let harness = Harness::new(&fixtures::test_config());
    harness.text.push_reply("not json");
    harness.text.push_reply("not json either");

    let (first, first_handle) = harness.service.spawn(JobInputs::new());
    let (second, second_handle) = harness.service.spawn(JobInputs::new());
    assert_ne!(first, second);

    let first_record = first_handle.await.unwrap();
    let second_record = second_handle.await.unwrap();
    assert_eq!(first_record.id, first);
    assert_eq!(second_record.id, second);
    assert_eq!(first_record.state, JobState::Failed);
    assert_eq!(second_record.state, JobState::Failed);
    assert_eq!(harness.service.list_jobs().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_limit_keeps_queued_jobs_created() {
    let mut config = fixtures::test_config();
    config.pipeline.max_concurrent_jobs = 1;
    let harness = Harness::new(&config);
    harness.script_through_clips("a", 1);
    harness.script_sounds("a", 1);
    harness.script_composition("a");
    harness.script_through_clips("b", 1);
    harness.script_sounds("b", 1);
    harness.script_composition("b");

    let (first, first_handle) = harness.service.spawn(JobInputs::new());
    let (second, second_handle) = harness.service.spawn(JobInputs::new());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(harness.service.inspect(&first).unwrap().state, JobState::Running);
    assert_eq!(harness.service.inspect(&second).unwrap().state, JobState::Created);
    assert_eq!(harness.service.list_active().len(), 2);

    assert_eq!(first_handle.await.unwrap().state, JobState::Completed);
    let second_record = second_handle.await.unwrap();
    assert_eq!(second_record.state, JobState::Completed);
    assert_eq!(second_record.composed_url(), Some("https://cdn.test/b/final.mp4"));
}

#[tokio::test(start_paused = true)]
async fn test_submit_is_non_blocking_and_inspectable() {
    let harness = Harness::new(&fixtures::test_config());
    harness.script_through_clips("j8", 1);
    harness.script_sounds("j8", 1);
    harness.script_composition("j8");

    let id = harness.service.submit(harness.service.default_inputs());
    let queued = harness.service.inspect(&id).unwrap();
    assert_eq!(queued.state, JobState::Created);

    let mut states = vec![queued.state];
    loop {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let state = harness.service.inspect(&id).unwrap().state;
        if states.last() != Some(&state) {
            states.push(state);
        }
        if state.is_terminal() {
            break;
        }
    }
    assert_eq!(states, vec![JobState::Created, JobState::Running, JobState::Completed]);
    assert!(harness.service.inspect(&crate::jobs::JobId::new()).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_lifecycle_events_in_order() {
    let harness = Harness::new(&fixtures::test_config());
    harness.script_through_clips("j9", 1);
    harness.script_sounds("j9", 1);
    harness.script_composition("j9");

    harness.run(JobInputs::new()).await;

    let types = harness.events.event_types();
    assert_eq!(types.first().map(String::as_str), Some(JOB_STARTED));
    assert_eq!(types.last().map(String::as_str), Some(JOB_COMPLETED));
    assert_eq!(harness.events.events_of_type(STAGE_STARTED).len(), 5);
    assert_eq!(harness.events.events_of_type(STAGE_COMPLETED).len(), 5);
    assert!(harness.events.events_of_type(JOB_FAILED).is_empty());

    let stages: Vec<StageKind> = harness
        .events
        .events_of_type(STAGE_STARTED)
        .into_iter()
        .filter_map(|(_, data)| serde_json::from_value(data?["stage"].clone()).ok())
        .collect();
    assert_eq!(stages, StageKind::ALL.to_vec());
}

#[tokio::test(start_paused = true)]
async fn test_failed_job_emits_job_failed() {
    let harness = Harness::new(&fixtures::test_config());
    harness.text.push_reply(fixtures::idea_json());
    harness.text.push_reply("");

    harness.run(JobInputs::new()).await;

    let failed = harness.events.events_of_type(JOB_FAILED);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].1.as_ref().unwrap()["kind"], "input_validation");
    assert!(harness.events.events_of_type(JOB_COMPLETED).is_empty());
}

#[tokio::test]
async fn test_from_config_validates() {
    let dir = tempfile::tempdir().unwrap();
    let config = ClipflowConfig::default().with_storage_root(dir.path());
    let service = assert_ok!(VideoJobService::from_config(&config, &fixtures::credentials()));
    assert!(service.list_jobs().is_empty());
    assert!(service.stored_videos().await.unwrap().is_empty());

    let invalid = ClipflowConfig::default().with_max_scenes(0);
    let err = assert_err!(VideoJobService::from_config(&invalid, &fixtures::credentials()));
    assert!(matches!(err, ClipflowError::Config(_)));
}
