//! # Core Configuration Module
//!
//! Provides configuration management for the drive core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `DriveConfig`
//! instance that holds every collaborator and setting the core needs. It
//! enforces fail-fast validation so a missing backend bridge is reported at
//! startup instead of on the first upload.
//!
//! ## Required Dependencies
//!
//! - `IdentityProvider` - Sign-in and the session observer
//! - `BlobStore` - File bytes
//! - `MetadataStore` - Per-file records
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `HttpClient` - Used by HTTP-backed providers (desktop default: reqwest)
//! - `Clock` - Time source for upload path discriminators (default: system clock)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::DriveConfig;
//! use std::sync::Arc;
//!
//! let config = DriveConfig::builder()
//!     .identity_provider(Arc::new(MyIdentity))
//!     .blob_store(Arc::new(MyBlobStore))
//!     .metadata_store(Arc::new(MyMetadataStore))
//!     .max_concurrent_uploads(8)
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! The builder validates all required dependencies and provides actionable error
//! messages when capabilities are missing:
//!
//! ```should_panic
//! use core_runtime::config::DriveConfig;
//!
//! // This will panic with an actionable error message
//! let config = DriveConfig::builder()
//!     .build()
//!     .expect("Should fail - missing required bridges");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{BlobStore, Clock, HttpClient, IdentityProvider, MetadataStore, SystemClock};
use std::sync::Arc;

/// Default metadata collection, matching the existing backend data.
pub const DEFAULT_FILES_COLLECTION: &str = "files";

/// Default prefix of every blob path.
pub const DEFAULT_STORAGE_ROOT: &str = "users";

/// Content type recorded when neither the host nor the backend reports one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Number of access URLs remembered by the preview resolver.
pub const DEFAULT_URL_CACHE_CAPACITY: usize = 256;

const MAX_CONCURRENT_UPLOADS_LIMIT: usize = 64;

/// Core configuration for the drive.
///
/// Use [`DriveConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct DriveConfig {
    /// External identity service (required)
    pub identity_provider: Arc<dyn IdentityProvider>,

    /// Object storage for file bytes (required)
    pub blob_store: Arc<dyn BlobStore>,

    /// Document database for file records (required)
    pub metadata_store: Arc<dyn MetadataStore>,

    /// HTTP client for providers that talk REST (optional with desktop default)
    pub http_client: Option<Arc<dyn HttpClient>>,

    /// Time source
    pub clock: Arc<dyn Clock>,

    /// Collection holding one record per file
    pub files_collection: String,

    /// First segment of every blob path: `{storage_root}/{owner}/{discriminator}_{name}`
    pub storage_root: String,

    /// Upper bound on transfers in flight for one batch
    pub max_concurrent_uploads: usize,

    /// Capacity of the event bus ring buffer
    pub event_buffer_size: usize,

    /// Content type used when the source omits one
    pub default_content_type: String,

    /// Access URLs kept in memory, least recently used evicted first
    pub url_cache_capacity: usize,
}

impl std::fmt::Debug for DriveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveConfig")
            .field("identity_provider", &"IdentityProvider { ... }")
            .field("blob_store", &"BlobStore { ... }")
            .field("metadata_store", &"MetadataStore { ... }")
            .field(
                "http_client",
                &self.http_client.as_ref().map(|_| "HttpClient { ... }"),
            )
            .field("files_collection", &self.files_collection)
            .field("storage_root", &self.storage_root)
            .field("max_concurrent_uploads", &self.max_concurrent_uploads)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("default_content_type", &self.default_content_type)
            .field("url_cache_capacity", &self.url_cache_capacity)
            .finish()
    }
}

impl DriveConfig {
    /// Creates a new builder for constructing a `DriveConfig`.
    pub fn builder() -> DriveConfigBuilder {
        DriveConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Collection name and storage root are non-empty and contain no `/`
    /// - Upload concurrency is between 1 and 64
    /// - Event buffer holds at least one event
    /// - Default content type looks like a MIME type
    /// - URL cache holds at least one entry
    pub fn validate(&self) -> Result<()> {
        if self.files_collection.trim().is_empty() {
            return Err(Error::Config(
                "Files collection name cannot be empty".to_string(),
            ));
        }

        if self.files_collection.contains('/') {
            return Err(Error::Config(
                "Files collection name cannot contain '/'".to_string(),
            ));
        }

        if self.storage_root.trim().is_empty() || self.storage_root.contains('/') {
            return Err(Error::Config(
                "Storage root must be a single non-empty path segment".to_string(),
            ));
        }

        if self.max_concurrent_uploads == 0 {
            return Err(Error::Config(
                "Concurrent uploads must be greater than 0".to_string(),
            ));
        }

        if self.max_concurrent_uploads > MAX_CONCURRENT_UPLOADS_LIMIT {
            return Err(Error::Config(format!(
                "Concurrent uploads exceeds maximum of {}",
                MAX_CONCURRENT_UPLOADS_LIMIT
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if !self.default_content_type.contains('/') {
            return Err(Error::Config(format!(
                "Default content type '{}' is not a MIME type",
                self.default_content_type
            )));
        }

        if self.url_cache_capacity == 0 {
            return Err(Error::Config(
                "URL cache capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn identity_provider_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "IdentityProvider".to_string(),
        message: "IdentityProvider implementation is required for sign-in and session observation. \
                 Use provider-firebase's FirebaseAuth or inject a custom adapter."
            .to_string(),
    }
}

fn blob_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "BlobStore".to_string(),
        message: "BlobStore implementation is required for storing file contents. \
                 Use provider-firebase's FirebaseStorage or inject a custom adapter."
            .to_string(),
    }
}

fn metadata_store_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "MetadataStore".to_string(),
        message: "MetadataStore implementation is required for file records. \
                 Use provider-firebase's FirestoreMetadataStore or inject a custom adapter."
            .to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Option<Arc<dyn HttpClient>>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new()
        .map_err(|e| Error::Config(format!("Default HTTP client unavailable: {}", e)))?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(Some(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Option<Arc<dyn HttpClient>>> {
    Ok(None)
}

/// Builder for constructing [`DriveConfig`] instances.
///
/// Use this builder to incrementally set configuration options and then
/// call [`build()`](DriveConfigBuilder::build) to create the final config.
#[derive(Default)]
pub struct DriveConfigBuilder {
    identity_provider: Option<Arc<dyn IdentityProvider>>,
    blob_store: Option<Arc<dyn BlobStore>>,
    metadata_store: Option<Arc<dyn MetadataStore>>,
    http_client: Option<Arc<dyn HttpClient>>,
    clock: Option<Arc<dyn Clock>>,
    files_collection: Option<String>,
    storage_root: Option<String>,
    max_concurrent_uploads: Option<usize>,
    event_buffer_size: Option<usize>,
    default_content_type: Option<String>,
    url_cache_capacity: Option<usize>,
}

impl DriveConfigBuilder {
    /// Sets the identity provider (required).
    pub fn identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity_provider = Some(provider);
        self
    }

    /// Sets the blob store (required).
    pub fn blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(store);
        self
    }

    /// Sets the metadata store (required).
    pub fn metadata_store(mut self, store: Arc<dyn MetadataStore>) -> Self {
        self.metadata_store = Some(store);
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Overrides the time source.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the metadata collection name.
    ///
    /// Default: `"files"`
    pub fn files_collection(mut self, name: impl Into<String>) -> Self {
        self.files_collection = Some(name.into());
        self
    }

    /// Sets the first segment of blob paths.
    ///
    /// Default: `"users"`
    pub fn storage_root(mut self, root: impl Into<String>) -> Self {
        self.storage_root = Some(root.into());
        self
    }

    /// Sets how many files of one batch may transfer at the same time.
    ///
    /// Default: 4
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::DriveConfig;
    ///
    /// let builder = DriveConfig::builder()
    ///     .max_concurrent_uploads(8);
    /// ```
    pub fn max_concurrent_uploads(mut self, limit: usize) -> Self {
        self.max_concurrent_uploads = Some(limit);
        self
    }

    /// Sets the event bus capacity.
    ///
    /// Default: 100
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Sets the content type used when a file reports none.
    ///
    /// Default: `"application/octet-stream"`
    pub fn default_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.default_content_type = Some(content_type.into());
        self
    }

    /// Sets how many access URLs the preview resolver remembers.
    ///
    /// Default: 256
    pub fn url_cache_capacity(mut self, capacity: usize) -> Self {
        self.url_cache_capacity = Some(capacity);
        self
    }

    /// Builds the final `DriveConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns `Ok(DriveConfig)` on success, or an error if:
    /// - Required bridges are missing (IdentityProvider, BlobStore, MetadataStore)
    /// - Configuration values are invalid
    pub fn build(self) -> Result<DriveConfig> {
        let identity_provider = self
            .identity_provider
            .ok_or_else(identity_provider_missing_error)?;
        let blob_store = self.blob_store.ok_or_else(blob_store_missing_error)?;
        let metadata_store = self
            .metadata_store
            .ok_or_else(metadata_store_missing_error)?;

        let http_client = match self.http_client {
            Some(client) => Some(client),
            None => provide_default_http_client()?,
        };

        let config = DriveConfig {
            identity_provider,
            blob_store,
            metadata_store,
            http_client,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            files_collection: self
                .files_collection
                .unwrap_or_else(|| DEFAULT_FILES_COLLECTION.to_string()),
            storage_root: self
                .storage_root
                .unwrap_or_else(|| DEFAULT_STORAGE_ROOT.to_string()),
            max_concurrent_uploads: self.max_concurrent_uploads.unwrap_or(4),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            default_content_type: self
                .default_content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            url_cache_capacity: self
                .url_cache_capacity
                .unwrap_or(DEFAULT_URL_CACHE_CAPACITY),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{
        AccessUrl, AuthUser, BlobMetadata, BridgeError, FileDocument, InsertedDocument, LocalFile,
        ProgressReporter, SessionSubscription, StoredDocument,
    };

    type BridgeResult<T> = std::result::Result<T, BridgeError>;

    // Mock implementations for testing
    struct MockIdentity;

    #[async_trait]
    impl IdentityProvider for MockIdentity {
        async fn sign_up(&self, _email: &str, _password: &str) -> BridgeResult<AuthUser> {
            Ok(AuthUser::new("u1"))
        }

        async fn sign_in(&self, _email: &str, _password: &str) -> BridgeResult<AuthUser> {
            Ok(AuthUser::new("u1"))
        }

        async fn sign_out(&self) -> BridgeResult<()> {
            Ok(())
        }

        fn observe_session(&self) -> SessionSubscription {
            SessionSubscription::channel().1
        }
    }

    struct MockBlobStore;

    #[async_trait]
    impl BlobStore for MockBlobStore {
        async fn put(
            &self,
            _path: &str,
            _file: &LocalFile,
            _progress: ProgressReporter,
        ) -> BridgeResult<()> {
            Ok(())
        }

        async fn get_metadata(&self, path: &str) -> BridgeResult<BlobMetadata> {
            Err(BridgeError::NotFound(path.to_string()))
        }

        async fn get_access_url(&self, path: &str) -> BridgeResult<AccessUrl> {
            Ok(AccessUrl::new(format!("https://blobs.test/{}", path)))
        }

        async fn delete(&self, _path: &str) -> BridgeResult<()> {
            Ok(())
        }
    }

    struct MockMetadataStore;

    #[async_trait]
    impl MetadataStore for MockMetadataStore {
        async fn query_by_owner(
            &self,
            _collection: &str,
            _owner_id: &str,
        ) -> BridgeResult<Vec<StoredDocument>> {
            Ok(Vec::new())
        }

        async fn insert(
            &self,
            _collection: &str,
            _document: FileDocument,
        ) -> BridgeResult<InsertedDocument> {
            Err(BridgeError::NotAvailable("insert".to_string()))
        }

        async fn delete_by_id(&self, _collection: &str, _id: &str) -> BridgeResult<()> {
            Ok(())
        }
    }

    fn complete_builder() -> DriveConfigBuilder {
        DriveConfig::builder()
            .identity_provider(Arc::new(MockIdentity))
            .blob_store(Arc::new(MockBlobStore))
            .metadata_store(Arc::new(MockMetadataStore))
    }

    #[test]
    fn test_builder_requires_identity_provider() {
        let result = DriveConfig::builder()
            .blob_store(Arc::new(MockBlobStore))
            .metadata_store(Arc::new(MockMetadataStore))
            .build();

        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("IdentityProvider"));
        assert!(err_msg.contains("session observation"));
    }

    #[test]
    fn test_builder_requires_blob_store() {
        let result = DriveConfig::builder()
            .identity_provider(Arc::new(MockIdentity))
            .metadata_store(Arc::new(MockMetadataStore))
            .build();

        assert!(matches!(
            result,
            Err(Error::CapabilityMissing { ref capability, .. }) if capability == "BlobStore"
        ));
    }

    #[test]
    fn test_builder_requires_metadata_store() {
        let result = DriveConfig::builder()
            .identity_provider(Arc::new(MockIdentity))
            .blob_store(Arc::new(MockBlobStore))
            .build();

        let err = result.unwrap_err();
        assert!(err.is_capability_missing());
        assert!(err.to_string().contains("MetadataStore"));
    }

    #[test]
    fn test_builder_defaults() {
        let config = complete_builder().build().unwrap();

        assert_eq!(config.files_collection, "files");
        assert_eq!(config.storage_root, "users");
        assert_eq!(config.max_concurrent_uploads, 4);
        assert_eq!(config.event_buffer_size, 100);
        assert_eq!(config.default_content_type, "application/octet-stream");
        assert_eq!(config.url_cache_capacity, DEFAULT_URL_CACHE_CAPACITY);
    }

    #[test]
    fn test_builder_overrides() {
        let config = complete_builder()
            .files_collection("documents")
            .storage_root("userFiles")
            .max_concurrent_uploads(8)
            .event_buffer_size(16)
            .build()
            .unwrap();

        assert_eq!(config.files_collection, "documents");
        assert_eq!(config.storage_root, "userFiles");
        assert_eq!(config.max_concurrent_uploads, 8);
        assert_eq!(config.event_buffer_size, 16);
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let result = complete_builder().max_concurrent_uploads(0).build();

        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Concurrent uploads must be greater than 0"));
    }

    #[test]
    fn test_validate_rejects_excessive_concurrency() {
        let result = complete_builder().max_concurrent_uploads(65).build();

        assert!(result.unwrap_err().to_string().contains("maximum of 64"));
    }

    #[test]
    fn test_validate_rejects_nested_storage_root() {
        let result = complete_builder().storage_root("a/b").build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_empty_collection() {
        let result = complete_builder().files_collection("  ").build();

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_url_cache_capacity() {
        let result = complete_builder().url_cache_capacity(0).build();

        assert!(result
            .unwrap_err()
            .to_string()
            .contains("URL cache capacity must be greater than 0"));
    }

    #[test]
    fn test_validate_rejects_bad_default_content_type() {
        let result = complete_builder().default_content_type("binary").build();

        assert!(result.unwrap_err().to_string().contains("not a MIME type"));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_desktop_http_client_default() {
        let config = complete_builder().build().unwrap();
        assert!(config.http_client.is_some());
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_http_client_is_optional() {
        let config = complete_builder().build().unwrap();
        assert!(config.http_client.is_none());
    }

    #[test]
    fn test_config_is_cloneable() {
        let config = complete_builder().build().unwrap();
        let cloned = config.clone();

        assert_eq!(cloned.files_collection, config.files_collection);
        assert!(format!("{:?}", cloned).contains("BlobStore { ... }"));
    }
}
