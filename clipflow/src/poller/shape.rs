//! Decoders for provider status and result documents.
//!
//! Providers are inconsistent about where they put things. Every known
//! layout is a [`ResultShape`]; decoding tries shapes in a fixed order and
//! reports a [`ResponseShapeError`] when none matches.

use crate::errors::ResponseShapeError;
use serde_json::Value;

/// Body text the queue provider uses for "not finished yet" 400 replies.
pub const IN_PROGRESS_MARKER: &str = "Request is still in progress";

/// A known location of a task's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultShape {
    /// `data.outputs[0]`, a string or an object with `url`.
    OutputsArray,
    /// `response_url`: the result must be fetched separately.
    FollowUpUrl,
    /// `video.url`.
    VideoObject,
    /// `video_url`.
    VideoUrlField,
    /// `output.video.url`.
    NestedOutput,
}

impl ResultShape {
    /// Tries this shape against `body`.
    #[must_use]
    pub fn extract(&self, body: &Value) -> Option<String> {
        let found = match self {
            Self::OutputsArray => {
                let first = body.get("data")?.get("outputs")?.get(0)?;
                first.as_str().or_else(|| first.get("url").and_then(Value::as_str))
            }
            Self::FollowUpUrl => body.get("response_url").and_then(Value::as_str),
            Self::VideoObject => body.get("video")?.get("url").and_then(Value::as_str),
            Self::VideoUrlField => body.get("video_url").and_then(Value::as_str),
            Self::NestedOutput => body
                .get("output")?
                .get("video")?
                .get("url")
                .and_then(Value::as_str),
        }?;
        let trimmed = found.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    /// Human-readable path, used in error messages.
    #[must_use]
    pub fn path(&self) -> &'static str {
        match self {
            Self::OutputsArray => "data.outputs[0]",
            Self::FollowUpUrl => "response_url",
            Self::VideoObject => "video.url",
            Self::VideoUrlField => "video_url",
            Self::NestedOutput => "output.video.url",
        }
    }
}

/// Where a succeeded task's result lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultLocation {
    /// The result URL was in the status document.
    Inline(String),
    /// The result document must be fetched from this URL.
    FollowUp(String),
}

/// Reads the status string from the flat `status` field, falling back to
/// the nested `data.status`.
#[must_use]
pub fn extract_status(body: &Value) -> Option<&str> {
    body.get("status")
        .and_then(Value::as_str)
        .or_else(|| body.get("data")?.get("status")?.as_str())
}

/// Reads a failure reason, flat or nested, defaulting to "Unknown error".
#[must_use]
pub fn failure_reason(body: &Value) -> String {
    let reason = body
        .get("error")
        .or_else(|| body.get("data").and_then(|d| d.get("error")));
    match reason {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Null) | None => "Unknown error".to_string(),
        Some(Value::String(_)) => "Unknown error".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Whether a 400 body is the queue provider's "still in progress" signal.
#[must_use]
pub fn is_in_progress_rejection(body: &Value) -> bool {
    match body {
        Value::Object(_) => body
            .get("detail")
            .and_then(Value::as_str)
            .is_some_and(|detail| detail.contains(IN_PROGRESS_MARKER)),
        Value::String(text) => text.contains(IN_PROGRESS_MARKER),
        _ => false,
    }
}

/// Decodes a succeeded status document, trying `shapes` in order.
pub fn decode_result(body: &Value, shapes: &[ResultShape]) -> Result<ResultLocation, ResponseShapeError> {
    for shape in shapes {
        if let Some(url) = shape.extract(body) {
            return Ok(match shape {
                ResultShape::FollowUpUrl => ResultLocation::FollowUp(url),
                _ => ResultLocation::Inline(url),
            });
        }
    }
    Err(no_match("task status", shapes, body))
}

/// Decodes a fetched result document. Follow-up shapes are ignored: a
/// result document never redirects again.
pub fn decode_inline(body: &Value, shapes: &[ResultShape]) -> Result<String, ResponseShapeError> {
    shapes
        .iter()
        .filter(|shape| **shape != ResultShape::FollowUpUrl)
        .find_map(|shape| shape.extract(body))
        .ok_or_else(|| no_match("task result", shapes, body))
}

fn no_match(context: &str, shapes: &[ResultShape], body: &Value) -> ResponseShapeError {
    let tried: Vec<&str> = shapes.iter().map(ResultShape::path).collect();
    let keys = match body {
        Value::Object(map) => map.keys().cloned().collect::<Vec<_>>().join(", "),
        other => format!("<{}>", value_kind(other)),
    };
    ResponseShapeError::new(
        context,
        format!("no result URL at any of [{}]; top-level keys: [{keys}]", tried.join(", ")),
    )
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
