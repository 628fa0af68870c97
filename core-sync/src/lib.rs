//! # File Sync & Transfer Core
//!
//! Keeps the signed-in user's file list in step with the metadata store and
//! sequences the multi-step operations that change it.
//!
//! ## Components
//!
//! - **File Catalog** (`catalog`): the authoritative in-memory file list, refreshed from the metadata store
//! - **Upload Orchestrator** (`upload`): concurrent put → read back → record → cache pipeline with per-file outcomes
//! - **Delete Orchestrator** (`delete`): blob → record → cache removal with self-healing for missing blobs
//! - **Preview Resolver** (`preview`): content-type classification and cached access URLs
//! - **Notifications** (`notify`): one user-facing message per terminal outcome

pub mod catalog;
pub mod delete;
pub mod error;
pub mod format;
pub mod models;
pub mod notify;
pub mod preview;
pub mod upload;

pub use catalog::{FileCatalog, FileList};
pub use delete::{ConfirmedDelete, DeleteOrchestrator, DeleteResult};
pub use error::{DeleteError, ResolveError, Result, SyncError, UploadError};
pub use format::{format_bytes, FileKind};
pub use models::{
    destination_path, upload_discriminator, BatchId, DownloadLink, FileRecord, RecordId,
    UploadOutcome, UploadState, UploadTask,
};
pub use notify::confirmation_prompt;
pub use preview::{can_preview, Preview, PreviewKind, PreviewResolver};
pub use upload::{UploadBatch, UploadOrchestrator, UploadReport, UploadSettings};
