use bridge_traits::BridgeError;
use thiserror::Error;

/// Failures of the metadata sync engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The metadata query failed; the cached list was left as it was.
    #[error("Metadata store unavailable: {0}")]
    Unavailable(String),

    #[error("Record {record_id} belongs to {record_owner}, catalog holds files of {catalog_owner}")]
    ForeignOwner {
        record_id: String,
        record_owner: String,
        catalog_owner: String,
    },

    /// The catalog was cleared on sign-out and takes no records until the
    /// next refresh.
    #[error("Record {record_id} arrived after sign-out")]
    SignedOut { record_id: String },
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Why one file of an upload batch did not make it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// The blob was stored but its record was not written; the blob is orphaned.
    #[error("File stored at {storage_path} but its record could not be saved: {reason}")]
    MetadataWriteFailed { storage_path: String, reason: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Upload canceled")]
    Canceled,
}

impl UploadError {
    /// Classify a blob store failure during transfer or metadata read-back.
    pub fn from_transfer(error: BridgeError) -> Self {
        match error {
            BridgeError::Unauthorized(reason) => UploadError::PermissionDenied(reason),
            BridgeError::Canceled(_) => UploadError::Canceled,
            other => UploadError::TransferFailed(other.to_string()),
        }
    }

    pub fn is_metadata_failure(&self) -> bool {
        matches!(self, UploadError::MetadataWriteFailed { .. })
    }
}

/// Why a confirmed delete did not complete.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeleteError {
    #[error("Permission denied deleting {storage_path}: {reason}")]
    BlobPermissionDenied { storage_path: String, reason: String },

    #[error("Could not delete {storage_path}: {reason}")]
    BlobOther { storage_path: String, reason: String },

    /// The blob is gone but the record remains; needs manual cleanup.
    #[error("Blob removed but record {record_id} could not be deleted: {reason}")]
    MetadataDeleteFailed { record_id: String, reason: String },
}

/// Why an access URL could not be produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Preview is not supported for {content_type} files")]
    Unsupported { content_type: String },

    #[error("Access URL unavailable: {0}")]
    Unavailable(String),
}

impl From<BridgeError> for ResolveError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::NotFound(path) => ResolveError::NotFound(path),
            BridgeError::Unauthorized(reason) => ResolveError::PermissionDenied(reason),
            other => ResolveError::Unavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_classification() {
        assert_eq!(
            UploadError::from_transfer(BridgeError::Unauthorized("rules".into())),
            UploadError::PermissionDenied("rules".into())
        );
        assert_eq!(
            UploadError::from_transfer(BridgeError::Canceled("user".into())),
            UploadError::Canceled
        );
        assert!(matches!(
            UploadError::from_transfer(BridgeError::NotFound("bucket".into())),
            UploadError::TransferFailed(_)
        ));
    }

    #[test]
    fn test_resolve_classification() {
        assert_eq!(
            ResolveError::from(BridgeError::NotFound("a".into())),
            ResolveError::NotFound("a".into())
        );
        assert!(matches!(
            ResolveError::from(BridgeError::Unauthorized("b".into())),
            ResolveError::PermissionDenied(_)
        ));
        assert!(matches!(
            ResolveError::from(BridgeError::OperationFailed("c".into())),
            ResolveError::Unavailable(_)
        ));
    }
}
