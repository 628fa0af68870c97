//! Request plumbing shared by the Firebase services

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{FirebaseError, Result};

/// Attempts made for idempotent requests
const MAX_RETRIES: u32 = 3;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Supplies the signed-in user's id token to storage and database calls.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// A currently valid id token, or `None` when nobody is signed in.
    async fn id_token(&self) -> Result<Option<String>>;
}

/// A fixed token, for service accounts and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

#[async_trait]
impl TokenSource for StaticToken {
    async fn id_token(&self) -> Result<Option<String>> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Retry {
    /// Retry 429 and 5xx with exponential backoff
    Backoff,
    Never,
}

/// Send `request`, retrying rate limits and server errors when allowed.
///
/// Returns the last response whatever its status; classify it with
/// [`expect_success`].
pub(crate) async fn execute(
    http_client: &dyn HttpClient,
    request: HttpRequest,
    retry: Retry,
) -> Result<HttpResponse> {
    let request = request.with_default_timeout(REQUEST_TIMEOUT);
    let mut attempt = 0;

    loop {
        let response = http_client.execute(request.clone()).await?;
        let status = response.status;

        if response.is_success() {
            let endpoint = request.url.split('?').next().unwrap_or_default();
            debug!(status, endpoint, "Firebase request succeeded");
            return Ok(response);
        }

        if retry == Retry::Never || !response.is_retryable() {
            return Ok(response);
        }

        attempt += 1;
        if attempt >= MAX_RETRIES {
            warn!(status, attempts = MAX_RETRIES, "API request failed after retries");
            return Ok(response);
        }

        let backoff = Duration::from_millis(100 * 2u64.pow(attempt));
        warn!(status, attempt, backoff_ms = backoff.as_millis() as u64, "Retrying API request");
        tokio::time::sleep(backoff).await;
    }
}

/// Turn a non-2xx response into the matching [`FirebaseError`].
pub(crate) fn expect_success(response: HttpResponse, target: &str) -> Result<HttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(FirebaseError::from_status(
            response.status,
            target,
            &response.body,
        ))
    }
}

pub(crate) fn parse<T: serde::de::DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    serde_json::from_slice(&response.body).map_err(|e| FirebaseError::ParseError(e.to_string()))
}

/// Attach the bearer token when one is available.
pub(crate) async fn authorize(request: HttpRequest, tokens: &dyn TokenSource) -> Result<HttpRequest> {
    Ok(match tokens.id_token().await? {
        Some(token) => request.bearer_token(token),
        None => request,
    })
}
