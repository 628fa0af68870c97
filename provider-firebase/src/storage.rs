//! Cloud Storage for Firebase over its REST API
//!
//! Objects are addressed by their full path inside the project bucket. Read
//! URLs carry the object's download token, so they stay valid until the token
//! is revoked.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bridge_traits::storage::{AccessUrl, BlobMetadata, BlobStore, LocalFile, ProgressReporter};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::FirebaseConfig;
use crate::error::{FirebaseError, Result};
use crate::rest::{self, Retry, TokenSource};
use crate::types::StorageObject;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Blob store backed by the project's storage bucket.
pub struct FirebaseStorage {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    bucket: String,
    tokens: Arc<dyn TokenSource>,
}

impl FirebaseStorage {
    pub fn new(
        config: &FirebaseConfig,
        http_client: Arc<dyn HttpClient>,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            http_client,
            base_url: config.endpoints.storage.trim_end_matches('/').to_string(),
            bucket: config.storage_bucket.clone(),
            tokens,
        }
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/v0/b/{}/o/{}",
            self.base_url,
            self.bucket,
            urlencoding::encode(path)
        )
    }

    fn upload_url(&self, path: &str) -> String {
        format!(
            "{}/v0/b/{}/o?uploadType=media&name={}",
            self.base_url,
            self.bucket,
            urlencoding::encode(path)
        )
    }

    async fn send(&self, request: HttpRequest, path: &str) -> Result<bridge_traits::http::HttpResponse> {
        let request = rest::authorize(request, self.tokens.as_ref()).await?;
        let response = rest::execute(self.http_client.as_ref(), request, Retry::Backoff).await?;
        rest::expect_success(response, path)
    }

    async fn fetch_object(&self, path: &str) -> Result<StorageObject> {
        let request = HttpRequest::new(HttpMethod::Get, self.object_url(path));
        let response = self.send(request, path).await?;
        rest::parse(&response)
    }

    fn convert_object(object: StorageObject) -> Result<BlobMetadata> {
        let size = object
            .size
            .parse()
            .map_err(|_| FirebaseError::ParseError(format!("invalid object size {:?}", object.size)))?;
        let created_at = DateTime::parse_from_rfc3339(&object.time_created)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| FirebaseError::ParseError(format!("invalid timeCreated: {}", e)))?;

        Ok(BlobMetadata {
            path: object.name,
            size,
            content_type: object.content_type,
            created_at,
        })
    }
}

#[async_trait]
impl BlobStore for FirebaseStorage {
    #[instrument(skip(self, file, progress), fields(size = file.size()))]
    async fn put(&self, path: &str, file: &LocalFile, progress: ProgressReporter) -> BridgeResult<()> {
        let total = file.size();
        let content_type = file
            .content_type
            .clone()
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());
        progress.report(0, total);

        let request = HttpRequest::new(HttpMethod::Post, self.upload_url(path))
            .bytes(file.bytes.clone(), content_type);
        self.send(request, path).await.map_err(|e| {
            warn!(error = %e, "Upload failed");
            BridgeError::from(e)
        })?;

        progress.report(total, total);
        info!("Object uploaded");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_metadata(&self, path: &str) -> BridgeResult<BlobMetadata> {
        let object = self.fetch_object(path).await?;
        Ok(Self::convert_object(object)?)
    }

    #[instrument(skip(self))]
    async fn get_access_url(&self, path: &str) -> BridgeResult<AccessUrl> {
        let object = self.fetch_object(path).await?;
        let token = object.first_download_token().ok_or_else(|| {
            BridgeError::OperationFailed(format!("object {} has no download token", path))
        })?;

        debug!("Download URL issued");
        Ok(AccessUrl::new(format!(
            "{}?alt=media&token={}",
            self.object_url(path),
            urlencoding::encode(token)
        )))
    }

    #[instrument(skip(self))]
    async fn delete(&self, path: &str) -> BridgeResult<()> {
        let request = HttpRequest::new(HttpMethod::Delete, self.object_url(path));
        self.send(request, path).await?;
        info!("Object deleted");
        Ok(())
    }
}
