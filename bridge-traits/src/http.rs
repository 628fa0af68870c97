//! HTTP transport used by the backend providers.
//!
//! The identity, object storage and document database services are all REST
//! APIs. Providers build an [`HttpRequest`], hand it to the host's
//! [`HttpClient`] and classify the [`HttpResponse`] themselves: a non-2xx
//! status is a normal response here, not an error.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{BridgeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        }
    }

    /// Sending the request twice has the same effect as sending it once.
    pub fn is_idempotent(self) -> bool {
        !matches!(self, HttpMethod::Post | HttpMethod::Patch)
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    /// Whole-request deadline; the client default applies when unset
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        self.header("Authorization", format!("Bearer {}", token.as_ref()))
    }

    /// Serialize `body` as the JSON payload.
    pub fn json<T: Serialize>(self, body: &T) -> Result<Self> {
        let payload = serde_json::to_vec(body)
            .map_err(|e| BridgeError::InvalidInput(format!("Unserializable request body: {}", e)))?;
        Ok(self.bytes(Bytes::from(payload), "application/json"))
    }

    /// `application/x-www-form-urlencoded` payload.
    pub fn form(self, pairs: &[(&str, &str)]) -> Self {
        let encoded = pairs
            .iter()
            .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        self.bytes(Bytes::from(encoded), "application/x-www-form-urlencoded")
    }

    /// Raw payload with its media type.
    pub fn bytes(mut self, body: Bytes, content_type: impl Into<String>) -> Self {
        self.body = Some(body);
        self.header("Content-Type", content_type)
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Apply `duration` unless the caller already chose a deadline.
    pub fn with_default_timeout(mut self, duration: Duration) -> Self {
        self.timeout.get_or_insert(duration);
        self
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| BridgeError::OperationFailed(format!("Malformed JSON response: {}", e)))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Rate limited or a server fault; the same request may succeed later.
    pub fn is_retryable(&self) -> bool {
        self.status == 429 || self.is_server_error()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Schedule for [`HttpClient::execute_with_retry`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Double the delay after every retry; otherwise wait `base_delay` each time
    pub use_exponential_backoff: bool,
}

impl RetryPolicy {
    /// Delay before retry number `retry`, counting from 1.
    pub fn delay_for(&self, retry: u32) -> Duration {
        if !self.use_exponential_backoff {
            return self.base_delay;
        }
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            use_exponential_backoff: true,
        }
    }
}

/// Host HTTP stack.
///
/// Implementations own TLS and connection pooling. Authorization headers are
/// added by the provider building the request.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// One attempt. Transport failures are errors; any status is a response.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Send with retries. Clients without a retry loop fall back to a single
    /// attempt.
    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        _policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        self.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_body_sets_content_type() {
        let request = HttpRequest::new(HttpMethod::Post, "https://example.com/documents:runQuery")
            .bearer_token("id-1")
            .json(&serde_json::json!({"structuredQuery": {}}))
            .unwrap();

        assert_eq!(request.headers["Authorization"], "Bearer id-1");
        assert_eq!(request.headers["Content-Type"], "application/json");
        assert_eq!(request.body.as_deref(), Some(&br#"{"structuredQuery":{}}"#[..]));
    }

    #[test]
    fn test_form_body_is_encoded() {
        let request = HttpRequest::new(HttpMethod::Post, "https://example.com/v1/token")
            .form(&[("grant_type", "refresh_token"), ("refresh_token", "a/b+c")]);

        assert_eq!(
            request.headers["Content-Type"],
            "application/x-www-form-urlencoded"
        );
        assert_eq!(
            request.body.as_deref(),
            Some(&b"grant_type=refresh_token&refresh_token=a%2Fb%2Bc"[..])
        );
    }

    #[test]
    fn test_default_timeout_keeps_explicit_one() {
        let explicit = HttpRequest::new(HttpMethod::Get, "https://example.com")
            .timeout(Duration::from_secs(300))
            .with_default_timeout(Duration::from_secs(30));
        assert_eq!(explicit.timeout, Some(Duration::from_secs(300)));

        let defaulted = HttpRequest::new(HttpMethod::Get, "https://example.com")
            .with_default_timeout(Duration::from_secs(30));
        assert_eq!(defaulted.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_status_classes() {
        assert!(HttpResponse::new(204, Bytes::new()).is_success());
        assert!(HttpResponse::new(429, Bytes::new()).is_retryable());
        assert!(HttpResponse::new(503, Bytes::new()).is_retryable());
        assert!(!HttpResponse::new(404, Bytes::new()).is_retryable());
    }

    #[test]
    fn test_header_lookup_ignores_case() {
        let mut response = HttpResponse::new(200, Bytes::new());
        response
            .headers
            .insert("content-type".to_string(), "application/json".to_string());

        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(response.header("ETag"), None);
    }

    #[test]
    fn test_idempotent_methods() {
        assert!(HttpMethod::Get.is_idempotent());
        assert!(HttpMethod::Delete.is_idempotent());
        assert!(!HttpMethod::Post.is_idempotent());
        assert_eq!(HttpMethod::Patch.as_str(), "PATCH");
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            use_exponential_backoff: true,
        };

        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(300));

        let flat = RetryPolicy {
            use_exponential_backoff: false,
            ..policy
        };
        assert_eq!(flat.delay_for(4), Duration::from_millis(100));
    }
}
