//! Remote task handles and provider dialects.

use super::shape::ResultShape;
use crate::providers::Credential;
use serde_json::Value;
use std::fmt;

/// Response conventions of one provider family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderDialect {
    /// Prediction-style API: submission answers `{"data": {"id": ...}}`, the
    /// status document carries the outputs inline under `data.outputs`.
    Prediction,
    /// Queue-style API: submission answers `{"request_id": ...}`, a completed
    /// status points at the result through `response_url`.
    Queue,
}

impl ProviderDialect {
    /// Extracts the task id from a submission response.
    #[must_use]
    pub fn task_id(&self, submission: &Value) -> Option<String> {
        let raw = match self {
            Self::Prediction => submission.get("data").and_then(|d| d.get("id")),
            Self::Queue => submission.get("request_id"),
        }?;
        match raw {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Whether an HTTP 400 whose body says the request is still in progress
    /// means "keep polling" rather than "rejected".
    ///
    /// Only the queue provider is known to answer this way.
    #[must_use]
    pub fn tolerates_in_progress_rejection(&self) -> bool {
        matches!(self, Self::Queue)
    }

    /// Result shapes to try, in priority order.
    #[must_use]
    pub fn result_shapes(&self) -> &'static [ResultShape] {
        match self {
            Self::Prediction => &[ResultShape::OutputsArray, ResultShape::VideoUrlField],
            Self::Queue => &[
                ResultShape::FollowUpUrl,
                ResultShape::VideoObject,
                ResultShape::VideoUrlField,
                ResultShape::NestedOutput,
            ],
        }
    }
}

impl fmt::Display for ProviderDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prediction => write!(f, "prediction"),
            Self::Queue => write!(f, "queue"),
        }
    }
}

/// Handle to work accepted by a provider.
#[derive(Debug, Clone)]
pub struct RemoteTask {
    /// Provider task id.
    pub id: String,
    /// Where to query status.
    pub status_url: String,
    /// Provider conventions.
    pub dialect: ProviderDialect,
    /// Authorization for status and result queries.
    pub credential: Credential,
    /// Human-readable label used in logs (e.g. "clip 2").
    pub label: String,
}

impl RemoteTask {
    /// Creates a task handle, expanding `{id}` in the status template.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        status_url_template: &str,
        dialect: ProviderDialect,
        credential: Credential,
    ) -> Self {
        let id = id.into();
        Self {
            status_url: status_url_template.replace("{id}", &id),
            label: id.clone(),
            id,
            dialect,
            credential,
        }
    }

    /// Sets the log label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}
