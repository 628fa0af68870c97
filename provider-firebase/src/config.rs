//! Firebase project settings

use crate::error::{FirebaseError, Result};
use serde::{Deserialize, Serialize};

/// Identity toolkit REST base URL
pub const IDENTITY_API_BASE: &str = "https://identitytoolkit.googleapis.com";

/// Secure token REST base URL
pub const TOKEN_API_BASE: &str = "https://securetoken.googleapis.com";

/// Cloud Storage for Firebase REST base URL
pub const STORAGE_API_BASE: &str = "https://firebasestorage.googleapis.com";

/// Cloud Firestore REST base URL
pub const FIRESTORE_API_BASE: &str = "https://firestore.googleapis.com";

/// Web app settings of a Firebase project.
///
/// # Example
///
/// ```
/// use provider_firebase::FirebaseConfig;
///
/// let config = FirebaseConfig::new("api-key", "demo-project", "demo-project.appspot.com");
/// assert!(config.validate().is_ok());
/// assert_eq!(config.storage_bucket, "demo-project.appspot.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirebaseConfig {
    pub api_key: String,
    pub auth_domain: Option<String>,
    pub project_id: String,
    pub storage_bucket: String,
    pub messaging_sender_id: Option<String>,
    pub app_id: Option<String>,
    /// REST endpoints; point them at the local emulators for development.
    #[serde(default)]
    pub endpoints: Endpoints,
}

/// Base URLs of the REST services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoints {
    pub identity: String,
    pub token: String,
    pub storage: String,
    pub firestore: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            identity: IDENTITY_API_BASE.to_string(),
            token: TOKEN_API_BASE.to_string(),
            storage: STORAGE_API_BASE.to_string(),
            firestore: FIRESTORE_API_BASE.to_string(),
        }
    }
}

impl FirebaseConfig {
    pub fn new(
        api_key: impl Into<String>,
        project_id: impl Into<String>,
        storage_bucket: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            auth_domain: None,
            project_id: project_id.into(),
            storage_bucket: storage_bucket.into(),
            messaging_sender_id: None,
            app_id: None,
            endpoints: Endpoints::default(),
        }
    }

    /// Load settings from `FIREBASE_*` environment variables.
    ///
    /// Reads `FIREBASE_API_KEY`, `FIREBASE_AUTH_DOMAIN`, `FIREBASE_PROJECT_ID`,
    /// `FIREBASE_STORAGE_BUCKET`, `FIREBASE_MESSAGING_SENDER_ID` and
    /// `FIREBASE_APP_ID`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let config = Self {
            api_key: get("FIREBASE_API_KEY").unwrap_or_default(),
            auth_domain: get("FIREBASE_AUTH_DOMAIN"),
            project_id: get("FIREBASE_PROJECT_ID").unwrap_or_default(),
            storage_bucket: get("FIREBASE_STORAGE_BUCKET").unwrap_or_default(),
            messaging_sender_id: get("FIREBASE_MESSAGING_SENDER_ID"),
            app_id: get("FIREBASE_APP_ID"),
            endpoints: Endpoints::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Check that the settings required by every service are present.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(FirebaseError::Config(
                "FIREBASE_API_KEY is missing or empty. Firebase services cannot be initialized."
                    .to_string(),
            ));
        }
        if self.project_id.trim().is_empty() {
            return Err(FirebaseError::Config(
                "FIREBASE_PROJECT_ID is missing or empty.".to_string(),
            ));
        }
        if self.storage_bucket.trim().is_empty() {
            return Err(FirebaseError::Config(
                "FIREBASE_STORAGE_BUCKET is missing or empty.".to_string(),
            ));
        }
        Ok(())
    }
}
