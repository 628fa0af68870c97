//! # Delete Orchestrator
//!
//! Removes one file's blob, then its record, then the catalog entry.
//!
//! A blob that is already gone does not stop the sequence: the record and
//! catalog entry are removed anyway. Any other blob failure stops before the
//! record is touched. A record delete that fails after the blob was removed
//! is reported separately since it needs manual cleanup.

use crate::catalog::FileCatalog;
use crate::error::DeleteError;
use crate::models::FileRecord;
use crate::notify;
use bridge_traits::{BlobStore, BridgeError, MetadataStore};
use core_runtime::events::EventBus;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// A delete the user has confirmed.
///
/// Build it after showing [`confirmation_prompt`](crate::confirmation_prompt).
#[derive(Debug, Clone)]
pub struct ConfirmedDelete {
    record: FileRecord,
}

impl ConfirmedDelete {
    pub fn new(record: FileRecord) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &FileRecord {
        &self.record
    }
}

/// Result of a completed delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteResult {
    /// The blob was already missing from storage.
    pub blob_already_missing: bool,
    /// The catalog held the record and it was removed.
    pub removed_from_catalog: bool,
}

pub struct DeleteOrchestrator {
    blobs: Arc<dyn BlobStore>,
    metadata: Arc<dyn MetadataStore>,
    catalog: Arc<FileCatalog>,
    event_bus: EventBus,
    collection: String,
}

impl DeleteOrchestrator {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        catalog: Arc<FileCatalog>,
        event_bus: EventBus,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            blobs,
            metadata,
            catalog,
            event_bus,
            collection: collection.into(),
        }
    }

    #[instrument(skip(self, request), fields(record_id = %request.record.id, storage_path = %request.record.storage_path))]
    pub async fn delete(&self, request: ConfirmedDelete) -> Result<DeleteResult, DeleteError> {
        let record = request.record;
        let result = self.run(&record).await;

        match &result {
            Ok(outcome) => self
                .event_bus
                .notify(notify::delete_succeeded(&record, outcome.blob_already_missing)),
            Err(e) => self.event_bus.notify(notify::delete_failed(&record, e)),
        }
        result
    }

    async fn run(&self, record: &FileRecord) -> Result<DeleteResult, DeleteError> {
        let blob_already_missing = match self.blobs.delete(&record.storage_path).await {
            Ok(()) => false,
            Err(BridgeError::NotFound(_)) => {
                warn!("Blob already missing, removing record anyway");
                true
            }
            Err(BridgeError::Unauthorized(reason)) => {
                warn!(error = %reason, "Blob delete denied");
                return Err(DeleteError::BlobPermissionDenied {
                    storage_path: record.storage_path.clone(),
                    reason,
                });
            }
            Err(e) => {
                warn!(error = %e, "Blob delete failed");
                return Err(DeleteError::BlobOther {
                    storage_path: record.storage_path.clone(),
                    reason: e.to_string(),
                });
            }
        };

        if let Err(e) = self
            .metadata
            .delete_by_id(&self.collection, record.id.as_str())
            .await
        {
            error!(error = %e, "Blob removed but record delete failed; needs manual cleanup");
            return Err(DeleteError::MetadataDeleteFailed {
                record_id: record.id.to_string(),
                reason: e.to_string(),
            });
        }

        let removed_from_catalog = self.catalog.apply_removal(&record.id).await;
        info!(blob_already_missing, "File deleted");

        Ok(DeleteResult {
            blob_already_missing,
            removed_from_catalog,
        })
    }
}
