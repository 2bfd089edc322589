//! Single-job pipeline coordinator.
//!
//! The coordinator owns a job's [`JobWriter`] for the lifetime of one run.
//! Stages execute strictly in order; the first fatal error ends the job,
//! while audio failures are recorded and the pipeline continues.

use crate::config::{ClipflowConfig, Credentials};
use crate::core::{FailurePolicy, StageKind, StageResult, VideoIdea};
use crate::events::{
    EventSink, JOB_COMPLETED, JOB_FAILED, JOB_STARTED, STAGE_COMPLETED, STAGE_STARTED,
    STAGE_TOLERATED_FAILURE,
};
use crate::jobs::{
    FailureRecord, JobFailure, JobInputs, JobRecord, JobResult, JobWriter, PROGRESS_INITIALIZING,
    PROGRESS_SAVING,
};
use crate::observability::StageTimer;
use crate::poller::TaskPoller;
use crate::providers::{HttpTransport, QueueClient, QueueEndpoint, TextGenerator};
use crate::stages::{
    AudioInput, AudioOutcome, AudioSynthesisStage, ClipInput, ClipSynthesisStage,
    CompositionInput, CompositionStage, IdeationStage, ScriptingStage, Stage,
};
use crate::storage::{ArtifactStore, VideoMetadata};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};

/// The five stage executors of one pipeline.
#[derive(Debug)]
pub struct PipelineStages {
    /// Concept generation.
    pub ideation: IdeationStage,
    /// Scene scripting.
    pub scripting: ScriptingStage,
    /// Per-scene clip synthesis.
    pub clips: ClipSynthesisStage,
    /// Per-clip audio synthesis.
    pub audio: AudioSynthesisStage,
    /// Final composition.
    pub composition: CompositionStage,
}

impl PipelineStages {
    /// Wires every stage from configuration.
    ///
    /// Video tasks go to the prediction-style provider; audio and
    /// composition share the queue-style provider, each with its own
    /// status template.
    #[must_use]
    pub fn from_config(
        config: &ClipflowConfig,
        credentials: &Credentials,
        transport: Arc<dyn HttpTransport>,
        generator: Arc<dyn TextGenerator>,
    ) -> Self {
        let client = QueueClient::new(Arc::clone(&transport));
        let poller = TaskPoller::new(transport, config.polling.backoff());
        let max_wait = config.polling.max_wait();
        let clip_secs = config.video.clip_duration_secs;

        Self {
            ideation: IdeationStage::new(Arc::clone(&generator), config.text.prompts.clone()),
            scripting: ScriptingStage::new(
                generator,
                config.text.prompts.clone(),
                config.pipeline.max_scenes,
            ),
            clips: ClipSynthesisStage::new(
                client.clone(),
                poller.clone(),
                QueueEndpoint::video(&config.video, credentials.wavespeed.clone()),
                &config.video,
                max_wait,
            ),
            audio: AudioSynthesisStage::new(
                client.clone(),
                poller.clone(),
                QueueEndpoint::queue(&config.audio, credentials.fal.clone()),
                config.pipeline.audio_prompt_prefix.clone(),
                clip_secs,
                max_wait,
            ),
            composition: CompositionStage::new(
                client,
                poller,
                QueueEndpoint::queue(&config.composition, credentials.fal.clone()),
                clip_secs,
                max_wait,
            ),
        }
    }
}

/// Drives one job through every stage.
pub struct PipelineCoordinator {
    stages: PipelineStages,
    store: Arc<dyn ArtifactStore>,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for PipelineCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineCoordinator")
            .field("stages", &self.stages)
            .finish_non_exhaustive()
    }
}

impl PipelineCoordinator {
    /// Creates a coordinator.
    #[must_use]
    pub fn new(
        stages: PipelineStages,
        store: Arc<dyn ArtifactStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            stages,
            store,
            events,
        }
    }

    /// Runs the job to a terminal state and returns the final record.
    pub async fn run(&self, writer: JobWriter) -> JobRecord {
        let job_id = writer.id();
        let span = info_span!("job", job_id = %job_id);
        self.run_inner(&writer).instrument(span).await;
        writer.snapshot()
    }

    async fn run_inner(&self, writer: &JobWriter) {
        let job_id = writer.id();
        if let Err(err) = writer.start(PROGRESS_INITIALIZING) {
            error!(error = %err, "Job could not start");
            return;
        }
        info!("Job started");
        self.events
            .emit(JOB_STARTED, Some(json!({"job_id": job_id.to_string()})))
            .await;

        let timer = StageTimer::start("job");
        match self.execute(writer).await {
            Ok(result) => {
                let elapsed = timer.finish();
                let final_url = result.final_video_url.clone();
                if let Err(err) = writer.complete(result) {
                    error!(error = %err, "Could not mark job completed");
                    return;
                }
                info!(elapsed_s = elapsed.as_secs(), final_url = %final_url, "Job completed");
                self.events
                    .emit(
                        JOB_COMPLETED,
                        Some(json!({
                            "job_id": job_id.to_string(),
                            "final_video_url": final_url,
                            "elapsed_ms": elapsed.as_millis() as u64,
                        })),
                    )
                    .await;
            }
            Err(failure) => {
                error!(
                    stage = ?failure.stage,
                    kind = %failure.kind,
                    error = %failure.message,
                    "Job failed"
                );
                let data = json!({
                    "job_id": job_id.to_string(),
                    "stage": failure.stage,
                    "kind": failure.kind,
                    "error": failure.message,
                });
                if let Err(err) = writer.fail(failure) {
                    error!(error = %err, "Could not mark job failed");
                    return;
                }
                self.events.emit(JOB_FAILED, Some(data)).await;
            }
        }
    }

    async fn execute(&self, writer: &JobWriter) -> Result<JobResult, JobFailure> {
        let job_id = writer.id();
        let inputs: JobInputs = writer.snapshot().inputs;

        let idea = self
            .run_stage(writer, &self.stages.ideation, &inputs)
            .await?;
        writer.push_output(StageResult::Idea(idea.clone()));

        let scenes = self
            .run_stage(writer, &self.stages.scripting, &idea)
            .await?;
        writer.push_output(StageResult::SceneList(scenes.clone()));

        let clip_input = ClipInput {
            idea: idea.clone(),
            scenes: scenes.clone(),
        };
        let clips = self
            .run_stage(writer, &self.stages.clips, &clip_input)
            .await?;
        writer.push_output(StageResult::ClipRefList(clips.clone()));

        let audio = self.synthesize_audio(writer, &inputs, &idea, &clips).await?;
        writer.push_output(StageResult::AudioRefList(audio.tracks.clone()));

        let composition_input = CompositionInput {
            clips: clips.clone(),
            audio: audio.tracks.clone(),
        };
        let final_url = self
            .run_stage(writer, &self.stages.composition, &composition_input)
            .await?;
        writer.push_output(StageResult::ComposedArtifactRef(final_url.clone()));

        writer.set_progress(PROGRESS_SAVING);
        let metadata = VideoMetadata::new(
            job_id.to_string(),
            &idea,
            &scenes,
            clips,
            audio.tracks,
            final_url.clone(),
            inputs.include_sound,
        );
        let stored = self
            .store
            .persist(&job_id.to_string(), &final_url, &metadata)
            .await
            .map_err(|err| JobFailure::from(&err))?;
        info!(video_id = %stored.id, size_bytes = stored.size_bytes, "Final video saved");

        Ok(job_result(&idea, final_url, &stored.id, stored.filename))
    }

    async fn synthesize_audio(
        &self,
        writer: &JobWriter,
        inputs: &JobInputs,
        idea: &VideoIdea,
        clips: &[String],
    ) -> Result<AudioOutcome, JobFailure> {
        if !inputs.include_sound {
            info!(clips = clips.len(), "Sound disabled; composing video only");
            return Ok(AudioOutcome::silent(clips.len()));
        }

        let input = AudioInput {
            sound: idea.sound.clone(),
            clips: clips.to_vec(),
        };
        let outcome = self.run_stage(writer, &self.stages.audio, &input).await?;
        self.apply_failure_policy(writer, StageKind::AudioSynthesis, &outcome.failures)
            .await?;
        Ok(outcome)
    }

    /// Records per-item failures of a tolerant stage; the first one ends the
    /// job if the stage is fatal.
    async fn apply_failure_policy(
        &self,
        writer: &JobWriter,
        kind: StageKind,
        failures: &[FailureRecord],
    ) -> Result<(), JobFailure> {
        if kind.failure_policy() == FailurePolicy::Fatal {
            if let Some(first) = failures.first() {
                return Err(JobFailure::new(first.kind, Some(first.stage), first.error.clone()));
            }
            return Ok(());
        }

        for failure in failures {
            warn!(
                stage = %failure.stage,
                index = ?failure.index,
                error = %failure.error,
                "Tolerated stage failure"
            );
            writer.record_tolerated(failure.clone());
            self.events
                .emit(
                    STAGE_TOLERATED_FAILURE,
                    Some(json!({
                        "job_id": writer.id().to_string(),
                        "stage": failure.stage,
                        "index": failure.index,
                        "kind": failure.kind,
                        "error": failure.error,
                    })),
                )
                .await;
        }
        Ok(())
    }

    async fn run_stage<S: Stage>(
        &self,
        writer: &JobWriter,
        stage: &S,
        input: &S::Input,
    ) -> Result<S::Output, JobFailure> {
        let kind: StageKind = stage.kind();
        let job_id = writer.id().to_string();
        writer.set_progress(kind.progress_message());
        info!(stage = %kind, "Stage started");
        self.events
            .try_emit(STAGE_STARTED, Some(json!({"job_id": job_id, "stage": kind})));

        let timer = StageTimer::start(kind.to_string());
        let output = stage
            .execute(input)
            .await
            .map_err(|err| JobFailure::from(&err))?;
        let elapsed = timer.finish();

        info!(stage = %kind, elapsed_s = elapsed.as_secs(), "Stage completed");
        self.events
            .emit(
                STAGE_COMPLETED,
                Some(json!({
                    "job_id": job_id,
                    "stage": kind,
                    "elapsed_ms": elapsed.as_millis() as u64,
                })),
            )
            .await;
        Ok(output)
    }
}

/// Path under which a stored video is served.
#[must_use]
pub fn download_path(video_id: &str) -> String {
    format!("/videos/{video_id}/download")
}

fn job_result(idea: &VideoIdea, final_video_url: String, video_id: &str, filename: String) -> JobResult {
    JobResult {
        video_id: video_id.to_string(),
        filename,
        idea: idea.idea.clone(),
        caption: idea.caption.clone(),
        final_video_url,
        download_url: download_path(video_id),
    }
}
