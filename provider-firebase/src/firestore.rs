//! Cloud Firestore over its REST API
//!
//! One document per uploaded file. Document ids are generated client side and
//! `createdAt` is stamped by the server through a `REQUEST_TIME` transform.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::metadata::{FileDocument, InsertedDocument, MetadataStore, StoredDocument};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::FirebaseConfig;
use crate::error::{FirebaseError, Result};
use crate::rest::{self, Retry, TokenSource};
use crate::types::{
    CommitRequest, CommitResponse, Document, FieldTransform, Precondition, RunQueryItem, Value,
    Write,
};

const OWNER_FIELD: &str = "userId";
const CREATED_AT_FIELD: &str = "createdAt";

/// Metadata store backed by the project's default Firestore database.
pub struct FirestoreMetadataStore {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    /// `projects/{project}/databases/(default)/documents`
    root: String,
    tokens: Arc<dyn TokenSource>,
}

impl FirestoreMetadataStore {
    pub fn new(
        config: &FirebaseConfig,
        http_client: Arc<dyn HttpClient>,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            http_client,
            base_url: config.endpoints.firestore.trim_end_matches('/').to_string(),
            root: format!("projects/{}/databases/(default)/documents", config.project_id),
            tokens,
        }
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/v1/{}{}", self.base_url, self.root, suffix)
    }

    async fn send(&self, request: HttpRequest, target: &str, retry: Retry) -> Result<HttpResponse> {
        let request = rest::authorize(request, self.tokens.as_ref()).await?;
        let response = rest::execute(self.http_client.as_ref(), request, retry).await?;
        rest::expect_success(response, target)
    }

    fn encode_fields(document: &FileDocument) -> HashMap<String, Value> {
        HashMap::from([
            (OWNER_FIELD.to_string(), Value::string(&document.owner_id)),
            ("name".to_string(), Value::string(&document.name)),
            ("fullPath".to_string(), Value::string(&document.full_path)),
            ("size".to_string(), Value::integer(document.size)),
            ("contentType".to_string(), Value::string(&document.content_type)),
            (
                "timeCreated".to_string(),
                Value::string(document.time_created.to_rfc3339()),
            ),
        ])
    }

    fn decode_document(document: &Document) -> Result<StoredDocument> {
        let fields = &document.fields;
        let text = |key: &str| {
            fields
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    FirebaseError::ParseError(format!(
                        "document {} has no usable {}",
                        document.id(),
                        key
                    ))
                })
        };

        let size = fields
            .get("size")
            .and_then(Value::as_u64)
            .ok_or_else(|| FirebaseError::ParseError(format!("document {} has no size", document.id())))?;
        let time_created = parse_timestamp(&text("timeCreated")?)?;
        let content_type = fields
            .get("contentType")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let created_at = match fields.get(CREATED_AT_FIELD) {
            Some(Value::TimestampValue(ts)) => Some(parse_timestamp(ts)?),
            _ => None,
        };

        Ok(StoredDocument {
            id: document.id().to_string(),
            fields: FileDocument {
                owner_id: text(OWNER_FIELD)?,
                name: text("name")?,
                full_path: text("fullPath")?,
                size,
                content_type,
                time_created,
            },
            created_at,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| FirebaseError::ParseError(format!("invalid timestamp {:?}: {}", value, e)))
}

#[async_trait]
impl MetadataStore for FirestoreMetadataStore {
    #[instrument(skip(self))]
    async fn query_by_owner(
        &self,
        collection: &str,
        owner_id: &str,
    ) -> BridgeResult<Vec<StoredDocument>> {
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": OWNER_FIELD },
                        "op": "EQUAL",
                        "value": { "stringValue": owner_id }
                    }
                }
            }
        });
        let request = HttpRequest::new(HttpMethod::Post, self.url(":runQuery")).json(&body)?;
        let response = self.send(request, collection, Retry::Backoff).await?;
        let items: Vec<RunQueryItem> = rest::parse(&response)?;

        let mut documents = Vec::with_capacity(items.len());
        for document in items.iter().filter_map(|item| item.document.as_ref()) {
            match Self::decode_document(document) {
                Ok(stored) => documents.push(stored),
                Err(e) => warn!(document = %document.id(), error = %e, "Skipping malformed document"),
            }
        }

        debug!(count = documents.len(), "Documents queried");
        Ok(documents)
    }

    #[instrument(skip(self, document), fields(full_path = %document.full_path))]
    async fn insert(&self, collection: &str, document: FileDocument) -> BridgeResult<InsertedDocument> {
        let id = Uuid::new_v4().simple().to_string();
        let commit = CommitRequest {
            writes: vec![Write {
                update: Document {
                    name: format!("{}/{}/{}", self.root, collection, id),
                    fields: Self::encode_fields(&document),
                    create_time: None,
                    update_time: None,
                },
                update_transforms: vec![FieldTransform::request_time(CREATED_AT_FIELD)],
                current_document: Some(Precondition { exists: false }),
            }],
        };

        let request = HttpRequest::new(HttpMethod::Post, self.url(":commit")).json(&commit)?;
        // A retried commit could trip the exists=false precondition.
        let response = self.send(request, collection, Retry::Never).await?;
        let committed: CommitResponse = rest::parse(&response)?;

        let stamped = committed
            .write_results
            .first()
            .and_then(|result| result.transform_results.first())
            .and_then(Value::as_str)
            .unwrap_or(committed.commit_time.as_str());
        let created_at = parse_timestamp(stamped)?;

        info!(id = %id, "Document inserted");
        Ok(InsertedDocument { id, created_at })
    }

    #[instrument(skip(self))]
    async fn delete_by_id(&self, collection: &str, id: &str) -> BridgeResult<()> {
        let request = HttpRequest::new(
            HttpMethod::Delete,
            self.url(&format!("/{}/{}", collection, urlencoding::encode(id))),
        );
        self.send(request, id, Retry::Backoff).await?;
        info!("Document deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::StaticToken;
    use bridge_traits::error::BridgeError;
    use mockall::mock;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn respond(status: u16, body: &str) -> BridgeResult<HttpResponse> {
        Ok(HttpResponse::new(status, body.to_string()))
    }

    fn store(http_client: MockHttpClient) -> FirestoreMetadataStore {
        let config = FirebaseConfig::new("key", "demo", "demo.appspot.com");
        FirestoreMetadataStore::new(
            &config,
            Arc::new(http_client),
            Arc::new(StaticToken(Some("id-token".to_string()))),
        )
    }

    const QUERY_BODY: &str = r#"[
        {
            "document": {
                "name": "projects/demo/databases/(default)/documents/files/doc-1",
                "fields": {
                    "userId": {"stringValue": "u1"},
                    "name": {"stringValue": "a.txt"},
                    "fullPath": {"stringValue": "users/u1/1_a.txt"},
                    "size": {"integerValue": "3"},
                    "contentType": {"stringValue": "text/plain"},
                    "timeCreated": {"stringValue": "2024-03-01T10:00:00.000Z"},
                    "createdAt": {"timestampValue": "2024-03-01T10:00:01.500Z"}
                },
                "createTime": "2024-03-01T10:00:01.500Z",
                "updateTime": "2024-03-01T10:00:01.500Z"
            },
            "readTime": "2024-03-02T00:00:00Z"
        },
        {
            "document": {
                "name": "projects/demo/databases/(default)/documents/files/doc-2",
                "fields": {
                    "userId": {"stringValue": "u1"},
                    "name": {"stringValue": "b.bin"},
                    "fullPath": {"stringValue": "users/u1/2_b.bin"},
                    "size": {"doubleValue": 5},
                    "timeCreated": {"stringValue": "2024-03-01T11:00:00Z"},
                    "createdAt": {"nullValue": null}
                }
            }
        },
        {
            "document": {
                "name": "projects/demo/databases/(default)/documents/files/broken",
                "fields": {"userId": {"stringValue": "u1"}}
            }
        },
        {"readTime": "2024-03-02T00:00:00Z"}
    ]"#;

    #[tokio::test]
    async fn test_query_filters_on_owner() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(1).returning(|request| {
            assert_eq!(
                request.url,
                "https://firestore.googleapis.com/v1/projects/demo/databases/(default)/documents:runQuery"
            );
            let body: serde_json::Value =
                serde_json::from_slice(request.body.as_deref().unwrap()).unwrap();
            let filter = &body["structuredQuery"]["where"]["fieldFilter"];
            assert_eq!(body["structuredQuery"]["from"][0]["collectionId"], "files");
            assert_eq!(filter["field"]["fieldPath"], "userId");
            assert_eq!(filter["value"]["stringValue"], "u1");
            respond(200, QUERY_BODY)
        });
        let store = store(http);

        let documents = store.query_by_owner("files", "u1").await.unwrap();

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].id, "doc-1");
        assert_eq!(documents[0].fields.size, 3);
        assert_eq!(
            documents[0].created_at.map(|t| t.timestamp_millis()),
            Some(1_709_287_201_500)
        );
        assert_eq!(documents[1].fields.size, 5);
        assert_eq!(documents[1].fields.content_type, "");
        assert_eq!(documents[1].created_at, None);
    }

    #[tokio::test]
    async fn test_insert_requests_server_timestamp() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(1).returning(|request| {
            assert!(request.url.ends_with("/documents:commit"));
            let body: serde_json::Value =
                serde_json::from_slice(request.body.as_deref().unwrap()).unwrap();
            let write = &body["writes"][0];
            assert!(write["update"]["name"]
                .as_str()
                .unwrap()
                .starts_with("projects/demo/databases/(default)/documents/files/"));
            assert_eq!(write["update"]["fields"]["userId"]["stringValue"], "u1");
            assert_eq!(write["update"]["fields"]["size"]["integerValue"], "3");
            assert_eq!(write["updateTransforms"][0]["fieldPath"], "createdAt");
            assert_eq!(write["updateTransforms"][0]["setToServerValue"], "REQUEST_TIME");
            assert_eq!(write["currentDocument"]["exists"], false);
            respond(
                200,
                r#"{
                    "writeResults": [{
                        "updateTime": "2024-03-01T10:00:02Z",
                        "transformResults": [{"timestampValue": "2024-03-01T10:00:02Z"}]
                    }],
                    "commitTime": "2024-03-01T10:00:02Z"
                }"#,
            )
        });
        let store = store(http);
        let document = FileDocument {
            owner_id: "u1".to_string(),
            name: "a.txt".to_string(),
            full_path: "users/u1/1_a.txt".to_string(),
            size: 3,
            content_type: "text/plain".to_string(),
            time_created: Utc::now(),
        };

        let inserted = store.insert("files", document).await.unwrap();

        assert_eq!(inserted.id.len(), 32);
        assert_eq!(inserted.created_at.timestamp(), 1_709_287_202);
    }

    #[tokio::test]
    async fn test_denied_insert_is_not_retried() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(1).returning(|_| {
            respond(
                403,
                r#"{"error":{"code":403,"message":"Missing or insufficient permissions."}}"#,
            )
        });
        let store = store(http);
        let document = FileDocument {
            owner_id: "u1".to_string(),
            name: "a.txt".to_string(),
            full_path: "users/u1/1_a.txt".to_string(),
            size: 3,
            content_type: "text/plain".to_string(),
            time_created: Utc::now(),
        };

        let result = store.insert("files", document).await;

        assert!(matches!(result, Err(BridgeError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_delete_by_id() {
        let mut http = MockHttpClient::new();
        http.expect_execute().times(1).returning(|request| {
            assert_eq!(request.method, HttpMethod::Delete);
            assert!(request.url.ends_with("/documents/files/doc-1"));
            respond(200, "{}")
        });
        let store = store(http);

        store.delete_by_id("files", "doc-1").await.unwrap();
    }
}
