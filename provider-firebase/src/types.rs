//! Firebase REST API wire types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Identity Toolkit
// ============================================================================

/// Body of `accounts:signUp` and `accounts:signInWithPassword`
///
/// See: https://cloud.google.com/identity-platform/docs/reference/rest/v1/accounts/signInWithPassword
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub return_secure_token: bool,
}

/// Successful sign-up or sign-in
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub local_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    pub id_token: String,
    pub refresh_token: String,
    /// Lifetime of `id_token` in seconds, sent as a string
    pub expires_in: String,
}

/// Secure token exchange response (snake_case on the wire)
///
/// See: https://firebase.google.com/docs/reference/rest/auth#section-refresh-token
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshResponse {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: String,
    pub user_id: String,
}

// ============================================================================
// Cloud Storage
// ============================================================================

/// Object resource returned by the storage REST API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageObject {
    pub name: String,
    #[serde(default)]
    pub bucket: Option<String>,
    /// Size in bytes (string-encoded)
    pub size: String,
    #[serde(default)]
    pub content_type: Option<String>,
    pub time_created: String,
    /// Comma-separated download tokens
    #[serde(default)]
    pub download_tokens: Option<String>,
}

impl StorageObject {
    pub fn first_download_token(&self) -> Option<&str> {
        self.download_tokens
            .as_deref()?
            .split(',')
            .map(str::trim)
            .find(|token| !token.is_empty())
    }
}

// ============================================================================
// Cloud Firestore
// ============================================================================

/// Typed field value
///
/// See: https://firebase.google.com/docs/firestore/reference/rest/v1/Value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Value {
    StringValue(String),
    /// 64-bit integer, string-encoded
    IntegerValue(String),
    DoubleValue(f64),
    BooleanValue(bool),
    /// RFC 3339 timestamp
    TimestampValue(String),
    NullValue(()),
}

impl Value {
    pub fn string(value: impl Into<String>) -> Self {
        Value::StringValue(value.into())
    }

    pub fn integer(value: u64) -> Self {
        Value::IntegerValue(value.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::StringValue(s) | Value::TimestampValue(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::IntegerValue(s) => s.parse().ok(),
            Value::DoubleValue(d) if *d >= 0.0 => Some(*d as u64),
            _ => None,
        }
    }
}

/// Document resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// `projects/{p}/databases/{d}/documents/{collection}/{id}`
    pub name: String,
    #[serde(default)]
    pub fields: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
}

impl Document {
    /// Last path segment of the resource name
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// One element of a `runQuery` response stream
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryItem {
    #[serde(default)]
    pub document: Option<Document>,
    #[serde(default)]
    pub read_time: Option<String>,
}

/// Body of `documents:commit`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    pub writes: Vec<Write>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Write {
    pub update: Document,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub update_transforms: Vec<FieldTransform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_document: Option<Precondition>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldTransform {
    pub field_path: String,
    pub set_to_server_value: String,
}

impl FieldTransform {
    pub fn request_time(field_path: impl Into<String>) -> Self {
        Self {
            field_path: field_path.into(),
            set_to_server_value: "REQUEST_TIME".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Precondition {
    pub exists: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    #[serde(default)]
    pub write_results: Vec<WriteResult>,
    pub commit_time: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteResult {
    #[serde(default)]
    pub update_time: Option<String>,
    #[serde(default)]
    pub transform_results: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_wire_format() {
        let json = serde_json::to_value(Value::integer(42)).unwrap();
        assert_eq!(json, serde_json::json!({ "integerValue": "42" }));

        let parsed: Value = serde_json::from_str(r#"{"nullValue":null}"#).unwrap();
        assert_eq!(parsed, Value::NullValue(()));
    }

    #[test]
    fn test_document_id() {
        let document: Document = serde_json::from_str(
            r#"{"name":"projects/p/databases/(default)/documents/files/abc123","fields":{}}"#,
        )
        .unwrap();
        assert_eq!(document.id(), "abc123");
    }

    #[test]
    fn test_first_download_token() {
        let object: StorageObject = serde_json::from_str(
            r#"{"name":"users/u1/a.txt","size":"3","timeCreated":"2024-01-01T00:00:00Z","downloadTokens":"tok1,tok2"}"#,
        )
        .unwrap();
        assert_eq!(object.first_download_token(), Some("tok1"));
    }
}
