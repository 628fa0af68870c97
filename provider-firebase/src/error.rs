//! Error types for the Firebase provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Firebase provider errors
#[derive(Error, Debug)]
pub enum FirebaseError {
    /// Project settings are missing or malformed
    #[error("Invalid Firebase configuration: {0}")]
    Config(String),

    /// The identity toolkit rejected the request
    #[error("Authentication failed: {code}")]
    AuthenticationFailed { code: String },

    /// The session can no longer be refreshed
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// API request returned an error
    #[error("Firebase API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Object or document does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Security rules denied the request
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Firebase operations
pub type Result<T> = std::result::Result<T, FirebaseError>;

impl FirebaseError {
    /// Classify a non-success HTTP response.
    pub(crate) fn from_status(status_code: u16, target: &str, body: &[u8]) -> Self {
        let message = error_message(body).unwrap_or_else(|| format!("HTTP {}", status_code));
        match status_code {
            404 => FirebaseError::NotFound(target.to_string()),
            401 | 403 => FirebaseError::PermissionDenied(format!("{}: {}", target, message)),
            _ => FirebaseError::ApiError {
                status_code,
                message,
            },
        }
    }
}

/// Pull `error.message` out of a Google API error body.
pub(crate) fn error_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

/// Identity toolkit codes look like `WEAK_PASSWORD : Password should be ...`.
pub(crate) fn auth_error_code(message: &str) -> String {
    message
        .split(" : ")
        .next()
        .unwrap_or(message)
        .trim()
        .to_string()
}

fn auth_error_text(code: &str) -> Option<&'static str> {
    match code {
        "EMAIL_EXISTS" => Some("This email is already registered."),
        "WEAK_PASSWORD" => Some("Password should be at least 6 characters."),
        "INVALID_EMAIL" => Some("Please enter a valid email address."),
        "MISSING_PASSWORD" => Some("Please enter a password."),
        _ => None,
    }
}

impl From<FirebaseError> for BridgeError {
    fn from(error: FirebaseError) -> Self {
        match error {
            FirebaseError::Config(msg) => BridgeError::NotAvailable(msg),
            FirebaseError::AuthenticationFailed { code } => match code.as_str() {
                "INVALID_LOGIN_CREDENTIALS" | "INVALID_PASSWORD" | "EMAIL_NOT_FOUND"
                | "USER_DISABLED" => BridgeError::Unauthorized(code),
                other => match auth_error_text(other) {
                    Some(text) => BridgeError::InvalidInput(text.to_string()),
                    None => BridgeError::OperationFailed(format!("Authentication failed: {}", code)),
                },
            },
            FirebaseError::SessionExpired(msg) => BridgeError::Unauthorized(msg),
            FirebaseError::ApiError {
                status_code,
                message,
            } => BridgeError::OperationFailed(format!(
                "API error (status {}): {}",
                status_code, message
            )),
            FirebaseError::NotFound(target) => BridgeError::NotFound(target),
            FirebaseError::PermissionDenied(msg) => BridgeError::Unauthorized(msg),
            FirebaseError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            FirebaseError::BridgeError(e) => e,
        }
    }
}
