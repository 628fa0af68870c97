//! Blob Storage Abstractions
//!
//! Path-keyed object storage with metadata read-back and time-limited access
//! URLs. Transfer progress is reported through an explicit channel.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;

/// A file selected or dropped by the user, fully loaded in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Original file name, without any directory component.
    pub name: String,
    pub bytes: Bytes,
    /// MIME type reported by the host, if any.
    pub content_type: Option<String>,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Canonical metadata of a stored blob, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobMetadata {
    pub path: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A time-limited URL granting read access to one blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessUrl {
    pub url: String,
    /// `None` when the backend does not advertise an expiry.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            expires_at: None,
        }
    }

    pub fn expiring_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// One progress sample of a running transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl TransferProgress {
    /// Completed fraction in `[0, 1]`. An empty transfer counts as complete.
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        (self.bytes_transferred as f64 / self.total_bytes as f64).clamp(0.0, 1.0)
    }
}

/// Per-transfer progress channel handed to [`BlobStore::put`].
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    sender: Option<mpsc::UnboundedSender<TransferProgress>>,
}

impl ProgressReporter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TransferProgress>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// A reporter that discards every sample.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn report(&self, bytes_transferred: u64, total_bytes: u64) {
        if let Some(sender) = &self.sender {
            // Receiver gone means nobody is watching; the transfer continues.
            let _ = sender.send(TransferProgress {
                bytes_transferred,
                total_bytes,
            });
        }
    }
}

/// Path-keyed object storage.
///
/// Failures must keep the backend's distinguishable kinds:
/// [`BridgeError::NotFound`](crate::BridgeError::NotFound) for a missing
/// object, [`BridgeError::Unauthorized`](crate::BridgeError::Unauthorized)
/// when rules deny access, anything else for other faults.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::{BlobStore, LocalFile, ProgressReporter};
///
/// async fn store(blobs: &dyn BlobStore, file: LocalFile) -> Result<u64> {
///     let path = format!("users/abc/1700000000000_{}", file.name);
///     blobs.put(&path, &file, ProgressReporter::disabled()).await?;
///     Ok(blobs.get_metadata(&path).await?.size)
/// }
/// ```
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload `file` to `path`, reporting progress along the way.
    async fn put(&self, path: &str, file: &LocalFile, progress: ProgressReporter) -> Result<()>;

    /// Read back the stored object's metadata.
    async fn get_metadata(&self, path: &str) -> Result<BlobMetadata>;

    /// Issue a time-limited read URL.
    async fn get_access_url(&self, path: &str) -> Result<AccessUrl>;

    /// Remove the object at `path`.
    async fn delete(&self, path: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_progress_fraction_is_clamped() {
        let over = TransferProgress {
            bytes_transferred: 150,
            total_bytes: 100,
        };
        let empty = TransferProgress {
            bytes_transferred: 0,
            total_bytes: 0,
        };

        assert_eq!(over.fraction(), 1.0);
        assert_eq!(empty.fraction(), 1.0);
    }

    #[tokio::test]
    async fn test_progress_reporter_delivers_samples() {
        let (reporter, mut receiver) = ProgressReporter::channel();
        reporter.report(10, 40);
        reporter.report(40, 40);
        drop(reporter);

        assert_eq!(receiver.recv().await.map(|p| p.fraction()), Some(0.25));
        assert_eq!(receiver.recv().await.map(|p| p.fraction()), Some(1.0));
        assert_eq!(receiver.recv().await, None);
    }

    #[test]
    fn test_access_url_expiry() {
        let now = Utc::now();
        let url = AccessUrl::new("https://example.com/a").expiring_at(now + Duration::minutes(5));

        assert!(!url.is_expired(now));
        assert!(url.is_expired(now + Duration::minutes(6)));
        assert!(!AccessUrl::new("https://example.com/b").is_expired(now));
    }

    #[test]
    fn test_local_file_size() {
        let file = LocalFile::new("notes.txt", "hello").with_content_type("text/plain");

        assert_eq!(file.size(), 5);
        assert_eq!(file.content_type.as_deref(), Some("text/plain"));
    }
}
