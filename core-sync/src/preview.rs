//! # Preview Resolver
//!
//! Decides whether a file can be rendered inline and produces time-limited
//! access URLs for previews and downloads.
//!
//! URL lookup order: the URL carried by the record, then URLs fetched
//! earlier in this process (keyed by storage path), then the blob store.
//! Expired URLs are skipped. Fetched URLs are attached to the catalog entry.
//!
//! Fetched URLs live in a bounded LRU cache; the least recently resolved
//! path is evicted once the cache is full.

use crate::catalog::FileCatalog;
use crate::error::ResolveError;
use crate::models::{DownloadLink, FileRecord};
use crate::notify;
use bridge_traits::{AccessUrl, BlobStore, Clock};
use core_runtime::config::DEFAULT_URL_CACHE_CAPACITY;
use core_runtime::events::EventBus;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

/// How a content type can be shown inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PreviewKind {
    Image,
    Video,
    Audio,
    Pdf,
    Text,
    Unsupported,
}

impl PreviewKind {
    /// Classify a MIME type. Parameters (`; charset=...`) and case are ignored.
    ///
    /// ```
    /// use core_sync::PreviewKind;
    ///
    /// assert_eq!(PreviewKind::classify("image/png"), PreviewKind::Image);
    /// assert_eq!(PreviewKind::classify("Text/Plain; charset=utf-8"), PreviewKind::Text);
    /// assert_eq!(PreviewKind::classify("application/zip"), PreviewKind::Unsupported);
    /// ```
    pub fn classify(content_type: &str) -> Self {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if essence.starts_with("image/") {
            PreviewKind::Image
        } else if essence.starts_with("video/") {
            PreviewKind::Video
        } else if essence.starts_with("audio/") {
            PreviewKind::Audio
        } else if essence == "application/pdf" {
            PreviewKind::Pdf
        } else if essence.starts_with("text/") {
            PreviewKind::Text
        } else {
            PreviewKind::Unsupported
        }
    }

    pub fn is_supported(self) -> bool {
        self != PreviewKind::Unsupported
    }
}

pub fn can_preview(content_type: &str) -> bool {
    PreviewKind::classify(content_type).is_supported()
}

/// Everything needed to render a preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub kind: PreviewKind,
    pub url: AccessUrl,
    pub file_name: String,
    pub content_type: String,
}

pub struct PreviewResolver {
    blobs: Arc<dyn BlobStore>,
    catalog: Arc<FileCatalog>,
    event_bus: EventBus,
    clock: Arc<dyn Clock>,
    urls: RwLock<LruCache<String, AccessUrl>>,
}

impl PreviewResolver {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        catalog: Arc<FileCatalog>,
        event_bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            blobs,
            catalog,
            event_bus,
            clock,
            urls: RwLock::new(LruCache::new(cache_capacity(DEFAULT_URL_CACHE_CAPACITY))),
        }
    }

    /// Replace the URL cache with an empty one holding at most `capacity`
    /// entries. A capacity of zero is treated as one.
    pub fn with_url_cache_capacity(mut self, capacity: usize) -> Self {
        self.urls = RwLock::new(LruCache::new(cache_capacity(capacity)));
        self
    }

    /// An access URL for `record`, fetched from the blob store only when no
    /// unexpired URL is known.
    #[instrument(skip(self, record), fields(record_id = %record.id))]
    pub async fn resolve(&self, record: &FileRecord) -> Result<AccessUrl, ResolveError> {
        let now = self.clock.now();

        if let Some(url) = record.access_url.as_ref().filter(|u| !u.is_expired(now)) {
            return Ok(url.clone());
        }
        {
            let mut urls = self.urls.write().await;
            match urls.get(&record.storage_path).cloned() {
                Some(url) if !url.is_expired(now) => {
                    debug!("Access URL served from cache");
                    return Ok(url);
                }
                Some(_) => {
                    urls.pop(&record.storage_path);
                }
                None => {}
            }
        }

        let url = self
            .blobs
            .get_access_url(&record.storage_path)
            .await
            .map_err(|e| {
                warn!(storage_path = %record.storage_path, error = %e, "Access URL request failed");
                ResolveError::from(e)
            })?;

        self.urls
            .write()
            .await
            .put(record.storage_path.clone(), url.clone());
        self.catalog.attach_access_url(&record.id, url.clone()).await;

        Ok(url)
    }

    /// Resolve a preview, rejecting unsupported types before any network call.
    pub async fn preview(&self, record: &FileRecord) -> Result<Preview, ResolveError> {
        let result = self.preview_inner(record).await;
        if let Err(e) = &result {
            self.event_bus.notify(notify::preview_failed(record, e));
        }
        result
    }

    async fn preview_inner(&self, record: &FileRecord) -> Result<Preview, ResolveError> {
        let kind = PreviewKind::classify(&record.content_type);
        if !kind.is_supported() {
            return Err(ResolveError::Unsupported {
                content_type: record.content_type.clone(),
            });
        }

        let url = self.resolve(record).await?;
        Ok(Preview {
            kind,
            url,
            file_name: record.display_name.clone(),
            content_type: record.content_type.clone(),
        })
    }

    /// A link for saving the file under its original name.
    pub async fn download_link(&self, record: &FileRecord) -> Result<DownloadLink, ResolveError> {
        match self.resolve(record).await {
            Ok(url) => {
                self.event_bus.notify(notify::download_started(record));
                Ok(DownloadLink {
                    url: url.url,
                    file_name: record.display_name.clone(),
                })
            }
            Err(e) => {
                self.event_bus.notify(notify::download_failed(record, &e));
                Err(e)
            }
        }
    }

    /// Drop every remembered URL.
    pub async fn clear_cache(&self) {
        self.urls.write().await.clear();
    }

    /// Number of URLs currently remembered.
    pub async fn cached_urls(&self) -> usize {
        self.urls.read().await.len()
    }
}

fn cache_capacity(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_preview() {
        for supported in ["image/png", "video/mp4", "application/pdf", "text/plain", "audio/mpeg"] {
            assert!(can_preview(supported), "{supported}");
        }
        for unsupported in ["application/zip", "application/octet-stream", "", "imagepng"] {
            assert!(!can_preview(unsupported), "{unsupported}");
        }
    }

    #[test]
    fn test_classify_ignores_case_and_parameters() {
        assert_eq!(PreviewKind::classify("APPLICATION/PDF"), PreviewKind::Pdf);
        assert_eq!(PreviewKind::classify("audio/ogg; codecs=opus"), PreviewKind::Audio);
        assert_eq!(PreviewKind::classify(" video/webm "), PreviewKind::Video);
    }
}
