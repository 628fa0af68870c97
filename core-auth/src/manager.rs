//! # Authentication Manager
//!
//! Email/password credential operations against the identity provider.
//!
//! The manager only performs the calls; the resulting session change arrives
//! through the [`SessionProvider`](crate::SessionProvider)'s observer, which is
//! the single place that emits `SignedIn`/`SignedOut` events. Failures are
//! reported as [`AuthEvent::AuthError`] plus a user-facing notification.

use crate::error::{AuthError, Result};
use crate::types::{Credentials, SessionUser};
use bridge_traits::IdentityProvider;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus, Notification};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{timeout, Duration};
use tracing::{error, info, instrument, warn};

/// Default timeout for credential operations
const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(30);

/// Performs sign-up, sign-in and sign-out.
pub struct AuthManager {
    identity: Arc<dyn IdentityProvider>,
    event_bus: EventBus,
    /// Held while a sign-in or sign-up is in flight
    in_progress: Mutex<()>,
    timeout: Duration,
}

impl AuthManager {
    pub fn new(identity: Arc<dyn IdentityProvider>, event_bus: EventBus) -> Self {
        Self {
            identity,
            event_bus,
            in_progress: Mutex::new(()),
            timeout: DEFAULT_AUTH_TIMEOUT,
        }
    }

    /// Override the per-operation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create an account. On success the new user is signed in.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidCredentials`] for a malformed email, a short
    ///   password, or an email the provider refuses
    /// - [`AuthError::SignInInProgress`] while another credential call runs
    /// - [`AuthError::OperationTimeout`] if the provider does not answer
    /// - [`AuthError::SignUpFailed`] for any other provider failure
    #[instrument(skip(self, email, password), fields(email = %email))]
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SessionUser> {
        let result = self.sign_up_inner(email, password).await;
        self.report("Sign Up Failed", &result);
        result
    }

    async fn sign_up_inner(&self, email: &str, password: &str) -> Result<SessionUser> {
        let credentials = Credentials::new(email, password)?;
        let _guard = self
            .in_progress
            .try_lock()
            .map_err(|_| AuthError::SignInInProgress)?;

        let user = timeout(
            self.timeout,
            self.identity
                .sign_up(credentials.email(), credentials.password()),
        )
        .await
        .map_err(|_| AuthError::OperationTimeout {
            operation: "sign_up".to_string(),
        })?
        .map_err(|e| AuthError::from_bridge(e, AuthError::SignUpFailed))?;

        info!(user_id = %user.uid, "Account created");
        Ok(user.into())
    }

    /// Sign in with email and password.
    ///
    /// Same error classification as [`sign_up`](Self::sign_up), with
    /// [`AuthError::SignInFailed`] for unclassified failures.
    #[instrument(skip(self, email, password), fields(email = %email))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionUser> {
        let result = self.sign_in_inner(email, password).await;
        self.report("Login Failed", &result);
        result
    }

    async fn sign_in_inner(&self, email: &str, password: &str) -> Result<SessionUser> {
        let credentials = Credentials::new(email, password)?;
        let _guard = self
            .in_progress
            .try_lock()
            .map_err(|_| AuthError::SignInInProgress)?;

        let user = timeout(
            self.timeout,
            self.identity
                .sign_in(credentials.email(), credentials.password()),
        )
        .await
        .map_err(|_| AuthError::OperationTimeout {
            operation: "sign_in".to_string(),
        })?
        .map_err(|e| AuthError::from_bridge(e, AuthError::SignInFailed))?;

        info!(user_id = %user.uid, "Signed in");
        Ok(user.into())
    }

    /// End the current session.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<()> {
        let result = match timeout(self.timeout, self.identity.sign_out()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(AuthError::SignOutFailed(e.to_string())),
            Err(_) => Err(AuthError::OperationTimeout {
                operation: "sign_out".to_string(),
            }),
        };

        match &result {
            Ok(()) => {
                info!("Signed out");
                self.event_bus.notify(Notification::success(
                    "Logged Out",
                    "You have been successfully logged out.",
                ));
            }
            Err(e) => {
                error!(error = %e, "Sign-out failed");
                self.emit_error(e);
                self.event_bus.notify(Notification::error(
                    "Logout Failed",
                    "Could not log you out. Please try again.",
                ));
            }
        }

        result
    }

    fn report<T>(&self, title: &str, result: &Result<T>) {
        if let Err(e) = result {
            warn!(error = %e, "Credential operation failed");
            self.emit_error(e);
            self.event_bus
                .notify(Notification::error(title, e.user_message()));
        }
    }

    fn emit_error(&self, error: &AuthError) {
        let recoverable = !matches!(error, AuthError::SignInInProgress);
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::AuthError {
            message: error.to_string(),
            recoverable,
        }));
    }
}
