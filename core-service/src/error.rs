use thiserror::Error;

/// Everything a [`DriveService`](crate::DriveService) call can fail with.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Wiring or lifecycle misuse: missing `start()`, use after `shutdown()`
    #[error("Drive service unavailable: {0}")]
    InitializationFailed(String),

    #[error(transparent)]
    Config(#[from] core_runtime::Error),

    #[error(transparent)]
    Auth(#[from] core_auth::AuthError),

    #[error(transparent)]
    Sync(#[from] core_sync::SyncError),

    #[error(transparent)]
    Delete(#[from] core_sync::DeleteError),

    #[error(transparent)]
    Resolve(#[from] core_sync::ResolveError),

    #[error("Host bridge failed: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),
}

impl CoreError {
    /// No user is signed in.
    pub fn is_not_authenticated(&self) -> bool {
        matches!(self, CoreError::Auth(core_auth::AuthError::NotAuthenticated))
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
