//! Metadata Store Abstraction
//!
//! A document database holding one record per uploaded file.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Fields written for each uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDocument {
    #[serde(rename = "userId")]
    pub owner_id: String,
    pub name: String,
    pub full_path: String,
    pub size: u64,
    pub content_type: String,
    /// Creation time of the blob, as read back from the blob store.
    pub time_created: DateTime<Utc>,
}

/// A document returned by a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub id: String,
    pub fields: FileDocument,
    /// Server-assigned insertion timestamp. `None` while still pending.
    pub created_at: Option<DateTime<Utc>>,
}

/// Result of a successful insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedDocument {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// Queryable document database.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// All documents in `collection` whose owner equals `owner_id`.
    async fn query_by_owner(&self, collection: &str, owner_id: &str) -> Result<Vec<StoredDocument>>;

    /// Insert a document; the store assigns the id and creation timestamp.
    async fn insert(&self, collection: &str, document: FileDocument) -> Result<InsertedDocument>;

    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<()>;
}
