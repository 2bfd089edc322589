//! Persistence of finished videos.
//!
//! The coordinator depends only on [`ArtifactStore`]. [`LocalArtifactStore`]
//! keeps videos and their metadata on the local filesystem.

mod local;

pub use local::{LocalArtifactStore, DEFAULT_DOWNLOAD_TIMEOUT};

use crate::core::{Scene, VideoIdea};
use crate::errors::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything known about a finished video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Job (and video) identifier.
    pub job_id: String,
    /// The idea.
    pub idea: String,
    /// Caption for publishing.
    pub caption: String,
    /// Setting description.
    pub environment: String,
    /// Sound description.
    pub sound: String,
    /// Production status.
    pub status: String,
    /// Scene descriptions, in order.
    pub scenes: Vec<String>,
    /// Clip URLs, in order.
    pub video_urls: Vec<String>,
    /// Audio URL per clip; `None` where there is no audio.
    pub sound_urls: Vec<Option<String>>,
    /// Composed video URL.
    pub final_video_url: String,
    /// Stored file name, filled in by the store.
    #[serde(default)]
    pub local_filename: Option<String>,
    /// Completion time.
    pub timestamp: DateTime<Utc>,
    /// Whether audio was requested.
    pub include_sound: bool,
}

impl VideoMetadata {
    /// Assembles metadata from pipeline outputs.
    #[must_use]
    pub fn new(
        job_id: impl Into<String>,
        idea: &VideoIdea,
        scenes: &[Scene],
        video_urls: Vec<String>,
        sound_urls: Vec<Option<String>>,
        final_video_url: impl Into<String>,
        include_sound: bool,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            idea: idea.idea.clone(),
            caption: idea.caption.clone(),
            environment: idea.environment.clone(),
            sound: idea.sound.clone(),
            status: idea.status.clone(),
            scenes: scenes.iter().map(|s| s.description.clone()).collect(),
            video_urls,
            sound_urls,
            final_video_url: final_video_url.into(),
            local_filename: None,
            timestamp: Utc::now(),
            include_sound,
        }
    }
}

/// A persisted video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArtifact {
    /// Video identifier.
    pub id: String,
    /// File name of the video.
    pub filename: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// Stored metadata.
    pub metadata: VideoMetadata,
}

/// Persists finished videos.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Fetches `source_url` and stores it with `metadata` under `id`.
    async fn persist(
        &self,
        id: &str,
        source_url: &str,
        metadata: &VideoMetadata,
    ) -> Result<StoredArtifact, StorageError>;

    /// Looks up a stored video.
    async fn get(&self, id: &str) -> Result<StoredArtifact, StorageError>;

    /// Lists stored videos, newest first.
    async fn list(&self) -> Result<Vec<StoredArtifact>, StorageError>;

    /// Removes a stored video and its metadata.
    async fn delete(&self, id: &str) -> Result<(), StorageError>;
}
