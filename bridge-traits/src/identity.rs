//! Identity Provider Abstraction
//!
//! Sign-up, sign-in and sign-out against the external identity service, plus a
//! session observer delivered as an explicit channel instead of callbacks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// A user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl AuthUser {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// One observation delivered by the session observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
    SignedIn(AuthUser),
    SignedOut,
    /// The observer itself failed; consumers treat this as logged out.
    Error(String),
}

/// Sending half of a session subscription, held by the provider.
#[derive(Debug, Clone)]
pub struct SessionPublisher {
    sender: mpsc::UnboundedSender<SessionChange>,
    cancel: CancellationToken,
}

impl SessionPublisher {
    /// Deliver a change. Returns `false` once the subscriber has gone away.
    pub fn publish(&self, change: SessionChange) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.sender.send(change).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.sender.is_closed()
    }
}

/// Receiving half of a session subscription.
///
/// Dropping the subscription or calling [`unsubscribe`](Self::unsubscribe)
/// detaches it from the provider.
#[derive(Debug)]
pub struct SessionSubscription {
    receiver: mpsc::UnboundedReceiver<SessionChange>,
    cancel: CancellationToken,
}

impl SessionSubscription {
    /// Create a connected publisher/subscription pair.
    pub fn channel() -> (SessionPublisher, SessionSubscription) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        (
            SessionPublisher {
                sender,
                cancel: cancel.clone(),
            },
            SessionSubscription { receiver, cancel },
        )
    }

    /// Wait for the next change. Returns `None` after unsubscribe or when the
    /// provider has dropped every publisher.
    pub async fn recv(&mut self) -> Option<SessionChange> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            change = self.receiver.recv() => change,
        }
    }

    pub fn unsubscribe(&self) {
        self.cancel.cancel();
    }

    /// Token that fires when this subscription is cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for SessionSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// External identity service.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::identity::{IdentityProvider, SessionChange};
///
/// async fn watch(identity: &dyn IdentityProvider) {
///     let mut subscription = identity.observe_session();
///     while let Some(change) = subscription.recv().await {
///         if let SessionChange::SignedIn(user) = change {
///             println!("signed in as {}", user.uid);
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account and sign it in.
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser>;

    /// Sign in with email and password.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser>;

    /// End the current session.
    async fn sign_out(&self) -> Result<()>;

    /// Subscribe to session changes. The current state is delivered first.
    fn observe_session(&self) -> SessionSubscription;
}
