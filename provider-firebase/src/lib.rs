//! # Firebase Provider
//!
//! Backend collaborators over the Firebase REST APIs.
//!
//! ## Overview
//!
//! - [`FirebaseAuth`] implements `IdentityProvider` with email/password
//!   accounts and keeps the id token fresh
//! - [`FirebaseStorage`] implements `BlobStore` over the project bucket
//! - [`FirestoreMetadataStore`] implements `MetadataStore` over the default
//!   Firestore database
//!
//! Every request goes through the host's `HttpClient`. Storage and database
//! calls are authorized with the id token of the signed-in user.
//!
//! ## Usage
//!
//! ```ignore
//! use provider_firebase::{FirebaseBackend, FirebaseConfig};
//!
//! let backend = FirebaseBackend::new(&FirebaseConfig::from_env()?, http_client);
//! let config = DriveConfig::builder()
//!     .identity_provider(backend.auth.clone())
//!     .blob_store(backend.storage.clone())
//!     .metadata_store(backend.firestore.clone())
//!     .build()?;
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod firestore;
pub mod rest;
pub mod storage;
pub mod types;

pub use auth::FirebaseAuth;
pub use config::{Endpoints, FirebaseConfig};
pub use error::{FirebaseError, Result};
pub use firestore::FirestoreMetadataStore;
pub use rest::{StaticToken, TokenSource};
pub use storage::FirebaseStorage;

use bridge_traits::http::HttpClient;
use std::sync::Arc;

/// The three services of one project, sharing a session.
#[derive(Clone)]
pub struct FirebaseBackend {
    pub auth: Arc<FirebaseAuth>,
    pub storage: Arc<FirebaseStorage>,
    pub firestore: Arc<FirestoreMetadataStore>,
}

impl FirebaseBackend {
    pub fn new(config: &FirebaseConfig, http_client: Arc<dyn HttpClient>) -> Self {
        let auth = Arc::new(FirebaseAuth::new(config, http_client.clone()));
        let tokens: Arc<dyn TokenSource> = auth.clone();

        Self {
            storage: Arc::new(FirebaseStorage::new(config, http_client.clone(), tokens.clone())),
            firestore: Arc::new(FirestoreMetadataStore::new(config, http_client, tokens)),
            auth,
        }
    }

    /// Validate `config` first, then build the services.
    pub fn from_config(config: &FirebaseConfig, http_client: Arc<dyn HttpClient>) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config, http_client))
    }
}
