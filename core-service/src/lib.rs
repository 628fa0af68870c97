//! Core service façade and bootstrap helpers.
//!
//! This crate wires the configured collaborators (identity provider, blob
//! store, metadata store) into one [`DriveService`]. Desktop hosts typically
//! enable the `desktop-shims` feature, which brings the `reqwest` HTTP client
//! and the file loader from `bridge-desktop`. The `firebase` feature adds
//! [`bootstrap_firebase`], building every collaborator from a Firebase project.

pub mod error;
mod service;

pub use error::{CoreError, Result};
pub use service::DriveService;

pub use core_auth::{SessionState, SessionUser, UserId};
pub use core_runtime::config::{DriveConfig, DriveConfigBuilder};
pub use core_runtime::events::{CoreEvent, Notification, NotificationLevel};
pub use core_sync::{
    can_preview, format_bytes, ConfirmedDelete, DeleteResult, DownloadLink, FileKind, FileList,
    FileRecord, Preview, PreviewKind, UploadBatch, UploadOutcome, UploadReport,
};

#[cfg(feature = "firebase")]
pub use provider_firebase::{FirebaseBackend, FirebaseConfig};

#[cfg(feature = "firebase")]
use bridge_traits::http::HttpClient;
#[cfg(feature = "firebase")]
use std::sync::Arc;

/// Build a service backed by a Firebase project.
///
/// `customize` may adjust the configuration (collection name, storage root,
/// upload concurrency) before it is validated.
///
/// ```ignore
/// use core_service::{bootstrap_firebase, FirebaseConfig};
///
/// let service = bootstrap_firebase(&FirebaseConfig::from_env()?, http_client, |b| b)?;
/// service.start().await?;
/// ```
#[cfg(feature = "firebase")]
pub fn bootstrap_firebase(
    firebase: &FirebaseConfig,
    http_client: Arc<dyn HttpClient>,
    customize: impl FnOnce(DriveConfigBuilder) -> DriveConfigBuilder,
) -> Result<DriveService> {
    let backend = FirebaseBackend::from_config(firebase, http_client.clone())
        .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;

    let builder = DriveConfig::builder()
        .identity_provider(backend.auth)
        .blob_store(backend.storage)
        .metadata_store(backend.firestore)
        .http_client(http_client);
    DriveService::new(customize(builder).build()?)
}

/// Build a Firebase-backed service from `FIREBASE_*` environment variables
/// using the desktop HTTP client.
#[cfg(all(
    feature = "firebase",
    feature = "desktop-shims",
    not(target_arch = "wasm32")
))]
pub fn bootstrap_firebase_from_env() -> Result<DriveService> {
    let firebase = FirebaseConfig::from_env()
        .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;
    let http_client: Arc<dyn HttpClient> = Arc::new(bridge_desktop::ReqwestHttpClient::new()?);
    bootstrap_firebase(&firebase, http_client, |builder| builder)
}

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
impl DriveService {
    /// Read the files at `paths` from disk and upload them.
    ///
    /// Nothing is uploaded when any file cannot be read.
    pub async fn upload_paths<P: AsRef<std::path::Path>>(&self, paths: &[P]) -> Result<UploadBatch> {
        let files = bridge_desktop::TokioFileLoader::new().load_all(paths).await?;
        self.upload(files)
    }
}
