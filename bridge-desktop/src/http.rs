//! `HttpClient` over reqwest
//!
//! `execute` performs exactly one attempt; callers that own a retry schedule
//! (the backend providers do) stay in control of it. `execute_with_retry`
//! applies a [`RetryPolicy`] for everyone else.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy},
};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Pooled rustls client shared by every provider of a process.
#[derive(Clone)]
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Whole-request timeout; uploads of large files need a generous one.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(10)
            .user_agent(concat!("drive-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BridgeError::NotAvailable(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
        }
    }

    async fn send_once(&self, request: HttpRequest) -> std::result::Result<HttpResponse, reqwest::Error> {
        let mut builder = self
            .client
            .request(Self::method(request.method), &request.url);
        for (key, value) in request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();
        let body = response.bytes().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn transport_error(error: reqwest::Error) -> BridgeError {
    if error.is_timeout() {
        BridgeError::OperationFailed("Request timed out".to_string())
    } else if error.is_connect() {
        BridgeError::NotAvailable(format!("Connection failed: {}", error))
    } else {
        BridgeError::OperationFailed(error.to_string())
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = request.method.as_str();
        // query strings carry api keys
        let endpoint = request.url.split('?').next().unwrap_or_default().to_string();
        let response = self.send_once(request).await.map_err(|e| {
            warn!(method, error = %e, "HTTP request failed");
            transport_error(e)
        })?;
        debug!(method, status = response.status, endpoint = %endpoint, "HTTP request completed");
        Ok(response)
    }

    /// Retries 429 always, 5xx only for replay-safe methods, and transport
    /// failures only when nothing reached the server (or the method is
    /// replay-safe).
    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let replay_safe = request.method.is_idempotent();
        let attempts = policy.max_attempts.max(1);
        let mut retry = 0;

        loop {
            let last_attempt = retry + 1 >= attempts;
            match self.send_once(request.clone()).await {
                Ok(response) => {
                    let retryable = response.status == 429
                        || (response.is_retryable() && replay_safe);
                    if !retryable || last_attempt {
                        return Ok(response);
                    }
                    warn!(status = response.status, attempt = retry + 1, "Retryable HTTP status");
                }
                Err(e) => {
                    let retryable = replay_safe || e.is_connect();
                    if !retryable || last_attempt {
                        return Err(transport_error(e));
                    }
                    warn!(error = %e, attempt = retry + 1, "HTTP request failed, retrying");
                }
            }

            retry += 1;
            let delay = policy.delay_for(retry);
            debug!(delay_ms = delay.as_millis() as u64, "Retrying after delay");
            tokio::time::sleep(delay).await;
        }
    }
}
