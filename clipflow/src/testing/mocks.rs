//! Scripted fakes for providers and storage.

use crate::errors::{GenerationError, StorageError, TransportError};
use crate::providers::{Credential, HttpReply, HttpTransport, TextGenerator, TextRequest};
use crate::storage::{ArtifactStore, StoredArtifact, VideoMetadata};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};

type Scripted = Result<HttpReply, TransportError>;

/// HTTP method of a recorded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET.
    Get,
    /// POST.
    Post,
}

/// A request seen by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// Method.
    pub method: Method,
    /// Target URL.
    pub url: String,
    /// JSON body, for POSTs.
    pub body: Option<Value>,
    /// `Authorization` header value.
    pub authorization: Option<String>,
}

/// Transport answering from per-URL reply queues.
///
/// Replies for the same method and URL are returned in the order they were
/// scripted. An exhausted queue answers with a connection error, or with
/// its last reply again when built with [`repeat_last`](Self::repeat_last).
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Scripted>>>,
    last: Mutex<HashMap<(Method, String), Scripted>>,
    repeat_last: bool,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    /// Creates a transport with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Repeats the last reply of an exhausted queue.
    #[must_use]
    pub fn repeat_last(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    /// Queues a reply to `GET url`.
    pub fn on_get(&self, url: &str, reply: HttpReply) {
        self.push(Method::Get, url, Ok(reply));
    }

    /// Queues a transport failure for `GET url`.
    pub fn on_get_error(&self, url: &str, error: TransportError) {
        self.push(Method::Get, url, Err(error));
    }

    /// Queues a reply to `POST url`.
    pub fn on_post(&self, url: &str, reply: HttpReply) {
        self.push(Method::Post, url, Ok(reply));
    }

    /// Queues a transport failure for `POST url`.
    pub fn on_post_error(&self, url: &str, error: TransportError) {
        self.push(Method::Post, url, Err(error));
    }

    /// Every request seen, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Bodies POSTed to `url`, in order.
    #[must_use]
    pub fn posts_to(&self, url: &str) -> Vec<Value> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == Method::Post && r.url == url)
            .filter_map(|r| r.body.clone())
            .collect()
    }

    /// Number of GETs issued to `url`.
    #[must_use]
    pub fn gets_to(&self, url: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.method == Method::Get && r.url == url)
            .count()
    }

    fn push(&self, method: Method, url: &str, reply: Scripted) {
        self.routes
            .lock()
            .entry((method, url.to_string()))
            .or_default()
            .push_back(reply);
    }

    fn answer(&self, request: RecordedRequest) -> Scripted {
        let key = (request.method, request.url.clone());
        self.requests.lock().push(request);

        let next = self.routes.lock().get_mut(&key).and_then(VecDeque::pop_front);
        match next {
            Some(reply) => {
                if self.repeat_last {
                    self.last.lock().insert(key, reply.clone());
                }
                reply
            }
            None => self.last.lock().get(&key).cloned().unwrap_or_else(|| {
                Err(TransportError::connection(&key.1, "no scripted reply"))
            }),
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn post_json(
        &self,
        url: &str,
        credential: &Credential,
        body: &Value,
    ) -> Result<HttpReply, TransportError> {
        self.answer(RecordedRequest {
            method: Method::Post,
            url: url.to_string(),
            body: Some(body.clone()),
            authorization: credential.header_value(),
        })
    }

    async fn get_json(&self, url: &str, credential: &Credential) -> Result<HttpReply, TransportError> {
        self.answer(RecordedRequest {
            method: Method::Get,
            url: url.to_string(),
            body: None,
            authorization: credential.header_value(),
        })
    }
}

/// Text generator answering from a reply queue.
#[derive(Debug, Default)]
pub struct ScriptedTextGenerator {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    requests: Mutex<Vec<TextRequest>>,
}

impl ScriptedTextGenerator {
    /// Creates a generator with no replies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a completion.
    pub fn push_reply(&self, text: impl Into<String>) {
        self.replies.lock().push_back(Ok(text.into()));
    }

    /// Queues a failure.
    pub fn push_error(&self, error: GenerationError) {
        self.replies.lock().push_back(Err(error));
    }

    /// Every request seen, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<TextRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedTextGenerator {
    async fn generate(&self, request: &TextRequest) -> Result<String, GenerationError> {
        self.requests.lock().push(request.clone());
        self.replies.lock().pop_front().unwrap_or_else(|| {
            Err(TransportError::connection("scripted-text", "no scripted reply").into())
        })
    }
}

/// In-memory artifact store.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: Mutex<Vec<(String, StoredArtifact)>>,
    sources: Mutex<HashMap<String, String>>,
    failure: Mutex<Option<String>>,
}

impl MemoryArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later `persist` fail with a download error.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    /// Ids persisted so far, in order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.artifacts.lock().iter().map(|(id, _)| id.clone()).collect()
    }

    /// The URL a stored video was fetched from.
    #[must_use]
    pub fn source_url(&self, id: &str) -> Option<String> {
        self.sources.lock().get(id).cloned()
    }

    fn find(&self, id: &str) -> Option<StoredArtifact> {
        self.artifacts
            .lock()
            .iter()
            .find(|(stored, _)| stored == id)
            .map(|(_, artifact)| artifact.clone())
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn persist(
        &self,
        id: &str,
        source_url: &str,
        metadata: &VideoMetadata,
    ) -> Result<StoredArtifact, StorageError> {
        if let Some(message) = self.failure.lock().clone() {
            return Err(StorageError::Download {
                url: source_url.to_string(),
                source: TransportError::connection(source_url, message),
            });
        }
        let filename = format!("{id}.mp4");
        let mut metadata = metadata.clone();
        metadata.local_filename = Some(filename.clone());
        let artifact = StoredArtifact {
            id: id.to_string(),
            filename,
            size_bytes: 0,
            metadata,
        };
        self.artifacts.lock().push((id.to_string(), artifact.clone()));
        self.sources.lock().insert(id.to_string(), source_url.to_string());
        Ok(artifact)
    }

    async fn get(&self, id: &str) -> Result<StoredArtifact, StorageError> {
        self.find(id).ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn list(&self) -> Result<Vec<StoredArtifact>, StorageError> {
        let mut artifacts: Vec<StoredArtifact> =
            self.artifacts.lock().iter().map(|(_, a)| a.clone()).collect();
        artifacts.sort_by(|a, b| b.metadata.timestamp.cmp(&a.metadata.timestamp));
        Ok(artifacts)
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let mut artifacts = self.artifacts.lock();
        let before = artifacts.len();
        artifacts.retain(|(stored, _)| stored != id);
        if artifacts.len() == before {
            return Err(StorageError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_transport_queues_per_url() {
        let transport = ScriptedTransport::new();
        transport.on_get("https://a", HttpReply::ok(json!(1)));
        transport.on_get("https://a", HttpReply::ok(json!(2)));

        let cred = Credential::Anonymous;
        assert_eq!(transport.get_json("https://a", &cred).await.unwrap().body, json!(1));
        assert_eq!(transport.get_json("https://a", &cred).await.unwrap().body, json!(2));
        assert!(transport.get_json("https://a", &cred).await.is_err());
        assert!(transport.get_json("https://b", &cred).await.is_err());
        assert_eq!(transport.gets_to("https://a"), 3);
    }

    #[tokio::test]
    async fn test_scripted_transport_repeat_last() {
        let transport = ScriptedTransport::new().repeat_last();
        transport.on_get("https://a", HttpReply::ok(json!("x")));
        let cred = Credential::Anonymous;
        for _ in 0..3 {
            assert_eq!(transport.get_json("https://a", &cred).await.unwrap().body, json!("x"));
        }
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryArtifactStore::new();
        let metadata = VideoMetadata::new(
            "job_1",
            &crate::testing::fixtures::idea(),
            &[],
            vec![],
            vec![],
            "https://cdn/f.mp4",
            true,
        );
        store.persist("job_1", "https://cdn/f.mp4", &metadata).await.unwrap();
        assert_eq!(store.ids(), vec!["job_1"]);
        assert_eq!(store.source_url("job_1").as_deref(), Some("https://cdn/f.mp4"));
        assert_eq!(store.get("job_1").await.unwrap().filename, "job_1.mp4");

        store.delete("job_1").await.unwrap();
        assert!(store.get("job_1").await.is_err());

        store.fail_with("disk full");
        assert!(store.persist("job_2", "u", &metadata).await.is_err());
    }
}
