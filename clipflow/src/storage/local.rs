//! Filesystem-backed artifact store.
//!
//! Layout: `<root>/videos/<id>.mp4` and `<root>/metadata/<id>.json`.

use super::{ArtifactStore, StoredArtifact, VideoMetadata};
use crate::errors::{StorageError, TransportError};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

const VIDEOS_DIR: &str = "videos";
const METADATA_DIR: &str = "metadata";

/// Upper bound on a single video download made by [`LocalArtifactStore::new`].
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

/// Stores videos and metadata under a root directory.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
    client: reqwest::Client,
}

impl LocalArtifactStore {
    /// Creates a store rooted at `root`. Directories are created lazily.
    ///
    /// Downloads are abandoned after [`DEFAULT_DOWNLOAD_TIMEOUT`].
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| TransportError::connection("<client>", e.to_string()))?;
        Ok(Self::with_client(root, client))
    }

    /// Creates a store using an existing HTTP client for downloads.
    ///
    /// The client's timeout bounds every download.
    #[must_use]
    pub fn with_client(root: impl Into<PathBuf>, client: reqwest::Client) -> Self {
        Self {
            root: root.into(),
            client,
        }
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the stored video for `id`.
    #[must_use]
    pub fn video_path(&self, id: &str) -> PathBuf {
        self.root.join(VIDEOS_DIR).join(format!("{id}.mp4"))
    }

    /// Path of the metadata document for `id`.
    #[must_use]
    pub fn metadata_path(&self, id: &str) -> PathBuf {
        self.root.join(METADATA_DIR).join(format!("{id}.json"))
    }

    /// Stores an already-fetched video.
    pub async fn import(
        &self,
        id: &str,
        bytes: &[u8],
        metadata: &VideoMetadata,
    ) -> Result<StoredArtifact, StorageError> {
        check_id(id)?;
        self.ensure_dirs().await?;
        let partial = self.partial_path(id);
        fs::write(&partial, bytes).await?;
        fs::rename(&partial, self.video_path(id)).await?;
        self.finish(id, metadata).await
    }

    async fn ensure_dirs(&self) -> Result<(), StorageError> {
        fs::create_dir_all(self.root.join(VIDEOS_DIR)).await?;
        fs::create_dir_all(self.root.join(METADATA_DIR)).await?;
        Ok(())
    }

    fn partial_path(&self, id: &str) -> PathBuf {
        self.root.join(VIDEOS_DIR).join(format!("{id}.mp4.part"))
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<u64, StorageError> {
        let download_err = |source: TransportError| StorageError::Download {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| download_err(TransportError::connection(url, e.to_string())))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(download_err(TransportError::status(url, status.as_u16(), body)));
        }

        let mut file = fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| download_err(TransportError::connection(url, e.to_string())))?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }

    async fn finish(&self, id: &str, metadata: &VideoMetadata) -> Result<StoredArtifact, StorageError> {
        let filename = format!("{id}.mp4");
        let mut metadata = metadata.clone();
        metadata.local_filename = Some(filename.clone());
        fs::write(self.metadata_path(id), serde_json::to_vec_pretty(&metadata)?).await?;

        let size_bytes = fs::metadata(self.video_path(id)).await?.len();
        info!(video_id = %id, size_bytes, "Video stored");
        Ok(StoredArtifact {
            id: id.to_string(),
            filename,
            size_bytes,
            metadata,
        })
    }
}

fn check_id(id: &str) -> Result<(), StorageError> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::NotFound(id.to_string()))
    }
}

async fn remove_if_exists(path: &Path) -> Result<bool, StorageError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn persist(
        &self,
        id: &str,
        source_url: &str,
        metadata: &VideoMetadata,
    ) -> Result<StoredArtifact, StorageError> {
        check_id(id)?;
        self.ensure_dirs().await?;

        let partial = self.partial_path(id);
        match self.download(source_url, &partial).await {
            Ok(bytes) => info!(video_id = %id, bytes, "Video downloaded"),
            Err(err) => {
                if let Err(cleanup) = remove_if_exists(&partial).await {
                    warn!(video_id = %id, error = %cleanup, "Failed to remove partial download");
                }
                return Err(err);
            }
        }
        fs::rename(&partial, self.video_path(id)).await?;
        self.finish(id, metadata).await
    }

    async fn get(&self, id: &str) -> Result<StoredArtifact, StorageError> {
        check_id(id)?;
        let video = self.video_path(id);
        let raw = match fs::read(self.metadata_path(id)).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(id.to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        let size_bytes = match fs::metadata(&video).await {
            Ok(meta) => meta.len(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(id.to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        let metadata: VideoMetadata = serde_json::from_slice(&raw)?;
        Ok(StoredArtifact {
            id: id.to_string(),
            filename: format!("{id}.mp4"),
            size_bytes,
            metadata,
        })
    }

    async fn list(&self) -> Result<Vec<StoredArtifact>, StorageError> {
        let mut entries = match fs::read_dir(self.root.join(METADATA_DIR)).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut stored = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.get(id).await {
                Ok(artifact) => stored.push(artifact),
                Err(err) => warn!(video_id = %id, error = %err, "Skipping unreadable stored video"),
            }
        }
        stored.sort_by(|a, b| b.metadata.timestamp.cmp(&a.metadata.timestamp));
        Ok(stored)
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        check_id(id)?;
        let video = remove_if_exists(&self.video_path(id)).await?;
        let metadata = remove_if_exists(&self.metadata_path(id)).await?;
        if !video && !metadata {
            return Err(StorageError::NotFound(id.to_string()));
        }
        info!(video_id = %id, video, metadata, "Video deleted");
        Ok(())
    }
}
