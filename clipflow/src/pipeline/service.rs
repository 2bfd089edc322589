//! Job submission and inspection.

use super::coordinator::{PipelineCoordinator, PipelineStages};
use crate::config::{ClipflowConfig, Credentials};
use crate::errors::{ClipflowError, StorageError};
use crate::events::{EventSink, LoggingEventSink};
use crate::jobs::{JobId, JobInputs, JobRecord, JobRegistry, RegistryStats};
use crate::providers::{ChatCompletionsGenerator, HttpTransport, ReqwestTransport, TextGenerator};
use crate::storage::{ArtifactStore, LocalArtifactStore, StoredArtifact};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Per-request HTTP timeout of the default transport, final download included.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Front door of the engine: accepts jobs and runs each one in the background.
///
/// At most `max_concurrent_jobs` pipelines run at once. A job waiting for a
/// slot stays `Created`.
pub struct VideoJobService {
    registry: Arc<JobRegistry>,
    coordinator: Arc<PipelineCoordinator>,
    store: Arc<dyn ArtifactStore>,
    permits: Arc<Semaphore>,
    max_concurrent_jobs: usize,
    include_sound: bool,
}

impl std::fmt::Debug for VideoJobService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoJobService")
            .field("registry", &self.registry)
            .field("max_concurrent_jobs", &self.max_concurrent_jobs)
            .field("available_permits", &self.permits.available_permits())
            .finish_non_exhaustive()
    }
}

impl VideoJobService {
    /// Builds the service with the HTTP providers and the local store.
    pub fn from_config(config: &ClipflowConfig, credentials: &Credentials) -> Result<Self, ClipflowError> {
        config.validate()?;
        let reqwest_transport = ReqwestTransport::new(DEFAULT_REQUEST_TIMEOUT)?;
        let store: Arc<dyn ArtifactStore> = Arc::new(LocalArtifactStore::with_client(
            config.storage.root.clone(),
            reqwest_transport.client().clone(),
        ));
        let transport: Arc<dyn HttpTransport> = Arc::new(reqwest_transport);
        let generator: Arc<dyn TextGenerator> = Arc::new(ChatCompletionsGenerator::new(
            Arc::clone(&transport),
            &config.text,
            credentials.openai.clone(),
        ));
        info!(
            storage_root = %config.storage.root.display(),
            max_concurrent_jobs = config.pipeline.max_concurrent_jobs,
            "Video job service configured"
        );
        Ok(Self::with_components(
            config,
            credentials,
            transport,
            generator,
            store,
            Arc::new(LoggingEventSink::default()),
        ))
    }

    /// Builds the service around caller-supplied collaborators.
    #[must_use]
    pub fn with_components(
        config: &ClipflowConfig,
        credentials: &Credentials,
        transport: Arc<dyn HttpTransport>,
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn ArtifactStore>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let stages = PipelineStages::from_config(config, credentials, transport, generator);
        let coordinator = PipelineCoordinator::new(stages, Arc::clone(&store), events);
        Self::new(
            coordinator,
            store,
            config.pipeline.max_concurrent_jobs,
            config.pipeline.include_sound,
        )
    }

    /// Wraps a coordinator.
    #[must_use]
    pub fn new(
        coordinator: PipelineCoordinator,
        store: Arc<dyn ArtifactStore>,
        max_concurrent_jobs: usize,
        include_sound: bool,
    ) -> Self {
        let max_concurrent_jobs = max_concurrent_jobs.max(1);
        Self {
            registry: Arc::new(JobRegistry::new()),
            coordinator: Arc::new(coordinator),
            store,
            permits: Arc::new(Semaphore::new(max_concurrent_jobs)),
            max_concurrent_jobs,
            include_sound,
        }
    }

    /// Inputs for a job with no custom prompt, using the configured sound default.
    #[must_use]
    pub fn default_inputs(&self) -> JobInputs {
        JobInputs::new().with_sound(self.include_sound)
    }

    /// Registers a job and schedules it. Returns immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, inputs: JobInputs) -> JobId {
        self.spawn(inputs).0
    }

    /// Like [`submit`](Self::submit), also returning the handle of the
    /// background task, which resolves to the final record.
    pub fn spawn(&self, inputs: JobInputs) -> (JobId, JoinHandle<JobRecord>) {
        let writer = self.registry.register(inputs);
        let job_id = writer.id();
        let coordinator = Arc::clone(&self.coordinator);
        let permits = Arc::clone(&self.permits);

        debug!(job_id = %job_id, available = permits.available_permits(), "Job queued");
        let handle = tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(err) => {
                    warn!(job_id = %job_id, error = %err, "Job slots closed; running unbounded");
                    None
                }
            };
            coordinator.run(writer).await
        });
        (job_id, handle)
    }

    /// Latest snapshot of a job.
    #[must_use]
    pub fn inspect(&self, id: &JobId) -> Option<JobRecord> {
        self.registry.get(id)
    }

    /// Every job, oldest first.
    #[must_use]
    pub fn list_jobs(&self) -> Vec<JobRecord> {
        self.registry.list()
    }

    /// Jobs not yet finished, oldest first.
    #[must_use]
    pub fn list_active(&self) -> Vec<JobRecord> {
        self.registry.list_active()
    }

    /// Active and total job counts.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        self.registry.stats()
    }

    /// The job table.
    #[must_use]
    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// A stored video.
    pub async fn stored_video(&self, id: &str) -> Result<StoredArtifact, StorageError> {
        self.store.get(id).await
    }

    /// Every stored video, newest first.
    pub async fn stored_videos(&self) -> Result<Vec<StoredArtifact>, StorageError> {
        self.store.list().await
    }

    /// Deletes a stored video.
    pub async fn delete_video(&self, id: &str) -> Result<(), StorageError> {
        self.store.delete(id).await
    }
}
