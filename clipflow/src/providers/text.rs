//! Text generation.

use super::transport::{Credential, HttpTransport};
use crate::config::{ApiKey, TextConfig};
use crate::errors::{GenerationError, ResponseShapeError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// A system + user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRequest {
    /// System prompt.
    pub system: String,
    /// User prompt.
    pub user: String,
}

impl TextRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Produces free text from a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates a completion for `request`.
    async fn generate(&self, request: &TextRequest) -> Result<String, GenerationError>;
}

/// Chat-completions client.
#[derive(Clone)]
pub struct ChatCompletionsGenerator {
    transport: Arc<dyn HttpTransport>,
    endpoint: String,
    model: String,
    temperature: f32,
    credential: Credential,
}

impl std::fmt::Debug for ChatCompletionsGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsGenerator")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionsGenerator {
    /// Creates a generator from configuration.
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>, config: &TextConfig, key: ApiKey) -> Self {
        Self {
            transport,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            credential: Credential::Bearer(key),
        }
    }

    fn payload(&self, request: &TextRequest) -> Value {
        json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user},
            ],
        })
    }
}

/// Pulls `choices[0].message.content` out of a completion envelope.
fn completion_content(body: &Value) -> Result<String, ResponseShapeError> {
    body.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ResponseShapeError::new("completion", "no choices[0].message.content"))
}

#[async_trait]
impl TextGenerator for ChatCompletionsGenerator {
    async fn generate(&self, request: &TextRequest) -> Result<String, GenerationError> {
        let reply = self
            .transport
            .post_json(&self.endpoint, &self.credential, &self.payload(request))
            .await?
            .error_for_status(&self.endpoint)?;
        let content = completion_content(&reply.body)?;
        debug!(model = %self.model, chars = content.len(), "Text generated");
        Ok(content)
    }
}
