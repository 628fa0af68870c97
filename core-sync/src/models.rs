//! # File and Upload Models
//!
//! Records mirrored from the metadata store and the ephemeral state of
//! in-flight uploads.

use crate::error::UploadError;
use bridge_traits::{AccessUrl, StoredDocument};
use chrono::{DateTime, Utc};
use core_auth::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Identifier assigned to a record by the metadata store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of one upload batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// File Records
// ============================================================================

/// One stored file, as known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: RecordId,
    pub owner_id: UserId,
    /// Original file name.
    pub display_name: String,
    /// Blob store key holding the bytes.
    pub storage_path: String,
    pub size_bytes: u64,
    pub content_type: String,
    /// Server-assigned insertion time.
    pub created_at: DateTime<Utc>,
    /// Creation time reported by the blob store.
    pub blob_created_at: Option<DateTime<Utc>>,
    /// Access URL resolved earlier, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_url: Option<AccessUrl>,
}

impl FileRecord {
    /// Build a record from a queried document.
    ///
    /// A document whose server timestamp is still pending falls back to the
    /// blob creation time. An empty content type becomes `default_content_type`.
    pub fn from_document(document: StoredDocument, default_content_type: &str) -> Self {
        let fields = document.fields;
        let content_type = if fields.content_type.trim().is_empty() {
            default_content_type.to_string()
        } else {
            fields.content_type
        };

        Self {
            id: RecordId::new(document.id),
            owner_id: UserId::new(fields.owner_id),
            display_name: fields.name,
            storage_path: fields.full_path,
            size_bytes: fields.size,
            content_type,
            created_at: document.created_at.unwrap_or(fields.time_created),
            blob_created_at: Some(fields.time_created),
            access_url: None,
        }
    }

    pub fn with_access_url(mut self, url: AccessUrl) -> Self {
        self.access_url = Some(url);
        self
    }
}

// ============================================================================
// Upload Tasks
// ============================================================================

/// Lifecycle of one file in an upload batch.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadState {
    Pending,
    /// Transfer running; fraction in `[0, 1]`, never decreasing.
    InProgress(f64),
    Succeeded,
    Failed(UploadError),
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Succeeded | UploadState::Failed(_))
    }

    /// Completed fraction, with terminal states reported as 1.0.
    pub fn fraction(&self) -> f64 {
        match self {
            UploadState::Pending => 0.0,
            UploadState::InProgress(fraction) => *fraction,
            UploadState::Succeeded | UploadState::Failed(_) => 1.0,
        }
    }
}

/// One file of an upload batch.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadTask {
    /// Position of the file in the submitted batch.
    pub index: usize,
    pub local_name: String,
    pub destination_path: String,
    pub state: UploadState,
}

impl UploadTask {
    pub fn new(index: usize, local_name: impl Into<String>, destination_path: String) -> Self {
        Self {
            index,
            local_name: local_name.into(),
            destination_path,
            state: UploadState::Pending,
        }
    }

    /// Move the transfer forward. Samples below the current fraction are
    /// ignored, and nothing changes once the task is terminal.
    pub fn advance(&mut self, fraction: f64) -> bool {
        let fraction = fraction.clamp(0.0, 1.0);
        match self.state {
            UploadState::Pending => {
                self.state = UploadState::InProgress(fraction);
                true
            }
            UploadState::InProgress(current) if fraction > current => {
                self.state = UploadState::InProgress(fraction);
                true
            }
            _ => false,
        }
    }
}

/// Build the blob store key for an upload.
///
/// ```
/// use core_auth::UserId;
/// use core_sync::destination_path;
///
/// let path = destination_path("users", &UserId::new("u1"), "1700000000000-3f2a9c1d07be", "a.txt");
/// assert_eq!(path, "users/u1/1700000000000-3f2a9c1d07be_a.txt");
/// ```
pub fn destination_path(
    root: &str,
    owner: &UserId,
    discriminator: impl fmt::Display,
    name: &str,
) -> String {
    let root = root.trim_end_matches('/');
    format!("{}/{}/{}_{}", root, owner, discriminator, name)
}

/// Path discriminator for one upload: the clock's milliseconds followed by
/// random hex, so two uploads never share a blob even within one tick.
pub fn upload_discriminator(unix_millis: i64) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{}", unix_millis, &random[..12])
}

/// Terminal result of one file in an upload batch.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub name: String,
    pub success: bool,
    pub error: Option<UploadError>,
    /// The record added to the catalog on success.
    pub record: Option<FileRecord>,
}

impl UploadOutcome {
    pub fn succeeded(name: impl Into<String>, record: FileRecord) -> Self {
        Self {
            name: name.into(),
            success: true,
            error: None,
            record: Some(record),
        }
    }

    pub fn failed(name: impl Into<String>, error: UploadError) -> Self {
        Self {
            name: name.into(),
            success: false,
            error: Some(error),
            record: None,
        }
    }
}

/// A URL the host can hand to its download mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadLink {
    pub url: String,
    /// Suggested name for the saved file.
    pub file_name: String,
}
