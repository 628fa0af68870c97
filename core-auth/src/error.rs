use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Session provider already started")]
    AlreadyStarted,

    #[error("Session observation failed: {0}")]
    ObservationFailed(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Sign-up failed: {0}")]
    SignUpFailed(String),

    #[error("Sign-in failed: {0}")]
    SignInFailed(String),

    #[error("Sign-out failed: {0}")]
    SignOutFailed(String),

    #[error("A sign-in or sign-up is already in progress")]
    SignInInProgress,

    #[error("Operation timed out: {operation}")]
    OperationTimeout { operation: String },
}

impl AuthError {
    /// Sentence suitable for a notification body.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::NotAuthenticated => "You must be logged in to do that.".to_string(),
            AuthError::InvalidCredentials(reason) => reason.clone(),
            AuthError::SignInInProgress => {
                "Please wait for the current request to finish.".to_string()
            }
            AuthError::OperationTimeout { .. } => {
                "The request timed out. Please check your connection and try again.".to_string()
            }
            AuthError::SignOutFailed(_) => "Could not log you out. Please try again.".to_string(),
            other => format!("{}. Please try again.", other),
        }
    }

    /// Classify a credential operation failure from the identity provider.
    pub(crate) fn from_bridge(error: BridgeError, wrap: fn(String) -> AuthError) -> AuthError {
        match error {
            BridgeError::Unauthorized(_) => AuthError::InvalidCredentials(
                "Incorrect email or password.".to_string(),
            ),
            BridgeError::InvalidInput(reason) => AuthError::InvalidCredentials(reason),
            other => wrap(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
