//! Work submission to queue-style providers.

use super::transport::{Credential, HttpTransport};
use crate::config::{ApiKey, QueueEndpointConfig, VideoConfig};
use crate::core::StageKind;
use crate::errors::{ResponseShapeError, StageError};
use crate::poller::{ProviderDialect, RemoteTask};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// One provider endpoint that accepts work and hands back a task id.
#[derive(Debug, Clone)]
pub struct QueueEndpoint {
    /// Submission URL.
    pub submit_url: String,
    /// Status URL with an `{id}` placeholder.
    pub status_url_template: String,
    /// Response conventions.
    pub dialect: ProviderDialect,
    /// Authorization.
    pub credential: Credential,
}

impl QueueEndpoint {
    /// Creates an endpoint.
    #[must_use]
    pub fn new(
        submit_url: impl Into<String>,
        status_url_template: impl Into<String>,
        dialect: ProviderDialect,
        credential: Credential,
    ) -> Self {
        Self {
            submit_url: submit_url.into(),
            status_url_template: status_url_template.into(),
            dialect,
            credential,
        }
    }

    /// Video-synthesis endpoint (prediction dialect, bearer auth).
    #[must_use]
    pub fn video(config: &VideoConfig, key: ApiKey) -> Self {
        Self::new(
            &config.submit_url,
            &config.status_url_template,
            ProviderDialect::Prediction,
            Credential::Bearer(key),
        )
    }

    /// Queue-dialect endpoint with `Key` auth, used for audio and composition.
    #[must_use]
    pub fn queue(config: &QueueEndpointConfig, key: ApiKey) -> Self {
        Self::new(
            &config.submit_url,
            &config.status_url_template,
            ProviderDialect::Queue,
            Credential::Key(key),
        )
    }
}

/// Submits work and turns the acknowledgement into a [`RemoteTask`].
#[derive(Clone)]
pub struct QueueClient {
    transport: Arc<dyn HttpTransport>,
}

impl std::fmt::Debug for QueueClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueClient").finish_non_exhaustive()
    }
}

impl QueueClient {
    /// Creates a client.
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Submits `payload` on behalf of `stage`.
    ///
    /// A transport failure or non-2xx reply is a submission error; a 2xx
    /// reply without a task id is a response shape error.
    pub async fn submit(
        &self,
        stage: StageKind,
        endpoint: &QueueEndpoint,
        payload: &Value,
    ) -> Result<RemoteTask, StageError> {
        debug!(stage = %stage, url = %endpoint.submit_url, "Submitting remote task");

        let reply = self
            .transport
            .post_json(&endpoint.submit_url, &endpoint.credential, payload)
            .await
            .and_then(|reply| reply.error_for_status(&endpoint.submit_url))
            .map_err(|source| StageError::Submission { stage, source })?;

        let task_id = endpoint.dialect.task_id(&reply.body).ok_or_else(|| StageError::ResponseShape {
            stage,
            source: ResponseShapeError::new(
                "submission",
                format!("no task id in {} acknowledgement: {}", endpoint.dialect, reply.body_excerpt()),
            ),
        })?;

        info!(stage = %stage, task_id = %task_id, "Remote task accepted");
        Ok(RemoteTask::new(
            task_id,
            &endpoint.status_url_template,
            endpoint.dialect,
            endpoint.credential.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TransportError;
    use crate::providers::HttpReply;
    use crate::testing::ScriptedTransport;
    use serde_json::json;

    fn endpoint(dialect: ProviderDialect) -> QueueEndpoint {
        QueueEndpoint::new(
            "https://api.example/submit",
            "https://api.example/tasks/{id}",
            dialect,
            Credential::Bearer(ApiKey::new("k")),
        )
    }

    #[tokio::test]
    async fn test_submit_prediction() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_post(
            "https://api.example/submit",
            HttpReply::ok(json!({"code": 200, "data": {"id": "pred-7"}})),
        );
        let client = QueueClient::new(transport.clone());

        let task = client
            .submit(StageKind::ClipSynthesis, &endpoint(ProviderDialect::Prediction), &json!({"prompt": "x"}))
            .await
            .unwrap();

        assert_eq!(task.id, "pred-7");
        assert_eq!(task.status_url, "https://api.example/tasks/pred-7");
        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].body, Some(json!({"prompt": "x"})));
        assert_eq!(requests[0].authorization.as_deref(), Some("Bearer k"));
    }

    #[tokio::test]
    async fn test_submit_rejected() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_post(
            "https://api.example/submit",
            HttpReply::new(422, json!({"detail": "prompt too long"})),
        );
        let client = QueueClient::new(transport);

        let err = client
            .submit(StageKind::Composition, &endpoint(ProviderDialect::Queue), &json!({}))
            .await
            .unwrap_err();
        match err {
            StageError::Submission { stage, source: TransportError::Status { status, .. } } => {
                assert_eq!(stage, StageKind::Composition);
                assert_eq!(status, 422);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_submit_without_task_id() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_post("https://api.example/submit", HttpReply::ok(json!({"status": "IN_QUEUE"})));
        let client = QueueClient::new(transport);

        let err = client
            .submit(StageKind::AudioSynthesis, &endpoint(ProviderDialect::Queue), &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, StageError::ResponseShape { .. }));
    }

    #[tokio::test]
    async fn test_submit_connection_failure() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on_post_error(
            "https://api.example/submit",
            TransportError::connection("https://api.example/submit", "connection reset"),
        );
        let client = QueueClient::new(transport);

        let err = client
            .submit(StageKind::ClipSynthesis, &endpoint(ProviderDialect::Prediction), &json!({}))
            .await
            .unwrap_err();
        match err {
            StageError::Submission { stage, source: TransportError::Connection { .. } } => {
                assert_eq!(stage, StageKind::ClipSynthesis);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
