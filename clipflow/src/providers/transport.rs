//! HTTP transport seam.

use crate::config::ApiKey;
use crate::errors::TransportError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

const ERROR_BODY_LIMIT: usize = 500;

/// Authorization scheme for a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// `Authorization: Bearer <key>`.
    Bearer(ApiKey),
    /// `Authorization: Key <key>`.
    Key(ApiKey),
    /// No authorization header.
    Anonymous,
}

impl Credential {
    /// Returns the `Authorization` header value, if any.
    #[must_use]
    pub fn header_value(&self) -> Option<String> {
        match self {
            Self::Bearer(key) => Some(format!("Bearer {}", key.expose())),
            Self::Key(key) => Some(format!("Key {}", key.expose())),
            Self::Anonymous => None,
        }
    }
}

/// A response of any status code.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    /// HTTP status code.
    pub status: u16,
    /// Decoded JSON body; a non-JSON body is kept as a string value.
    pub body: Value,
}

impl HttpReply {
    /// Creates a reply.
    #[must_use]
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Creates a `200 OK` reply.
    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body rendered for error messages, truncated.
    #[must_use]
    pub fn body_excerpt(&self) -> String {
        let text = match &self.body {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if text.len() <= ERROR_BODY_LIMIT {
            return text;
        }
        let mut end = ERROR_BODY_LIMIT;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    }

    /// Converts a non-2xx reply into a status error.
    pub fn error_for_status(self, url: &str) -> Result<Self, TransportError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::status(url, self.status, self.body_excerpt()))
        }
    }
}

/// Protocol for JSON-over-HTTP exchanges with providers.
///
/// Implementations return `Ok` for every response that arrived, whatever its
/// status; only failures to obtain a response are errors.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// POSTs a JSON body.
    async fn post_json(
        &self,
        url: &str,
        credential: &Credential,
        body: &Value,
    ) -> Result<HttpReply, TransportError>;

    /// GETs a JSON document.
    async fn get_json(&self, url: &str, credential: &Credential)
        -> Result<HttpReply, TransportError>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a per-request timeout.
    pub fn new(request_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TransportError::connection("<client>", e.to_string()))?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Returns the underlying client.
    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    async fn send(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
        credential: &Credential,
    ) -> Result<HttpReply, TransportError> {
        let request = match credential.header_value() {
            Some(value) => request.header(reqwest::header::AUTHORIZATION, value),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::connection(url, e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::connection(url, e.to_string()))?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(HttpReply { status, body })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        credential: &Credential,
        body: &Value,
    ) -> Result<HttpReply, TransportError> {
        self.send(url, self.client.post(url).json(body), credential)
            .await
    }

    async fn get_json(
        &self,
        url: &str,
        credential: &Credential,
    ) -> Result<HttpReply, TransportError> {
        self.send(url, self.client.get(url), credential).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_credential_header() {
        let bearer = Credential::Bearer(ApiKey::new("abc"));
        assert_eq!(bearer.header_value().as_deref(), Some("Bearer abc"));
        let key = Credential::Key(ApiKey::new("xyz"));
        assert_eq!(key.header_value().as_deref(), Some("Key xyz"));
        assert!(Credential::Anonymous.header_value().is_none());
    }

    #[test]
    fn test_reply_success_range() {
        assert!(HttpReply::ok(json!({})).is_success());
        assert!(HttpReply::new(204, Value::Null).is_success());
        assert!(!HttpReply::new(400, Value::Null).is_success());
        assert!(!HttpReply::new(301, Value::Null).is_success());
    }

    #[test]
    fn test_error_for_status() {
        let err = HttpReply::new(503, json!({"detail": "overloaded"}))
            .error_for_status("https://example.com/x")
            .unwrap_err();
        match err {
            TransportError::Status { status, body, .. } => {
                assert_eq!(status, 503);
                assert!(body.contains("overloaded"));
            }
            TransportError::Connection { .. } => panic!("expected status error"),
        }
    }

    #[test]
    fn test_body_excerpt_truncates() {
        let reply = HttpReply::new(500, Value::String("é".repeat(400)));
        let excerpt = reply.body_excerpt();
        assert!(excerpt.ends_with("..."));
        assert!(excerpt.len() <= ERROR_BODY_LIMIT + 3);
    }

    #[tokio::test]
    async fn test_unanswered_request_is_connection_error() {
        let (server, handle) = crate::testing::fixtures::silent_server().await.unwrap();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        let transport = ReqwestTransport::with_client(client);

        let err = transport
            .get_json(&format!("{server}/status"), &Credential::Anonymous)
            .await
            .unwrap_err();
        handle.abort();

        assert!(matches!(err, TransportError::Connection { .. }));
    }
}
