//! # Session Provider
//!
//! Owns the single subscription to the identity provider's session observer
//! and republishes it as a [`SessionState`] snapshot.
//!
//! Until the first observation arrives the state reports `is_resolving =
//! true`. Every observation afterwards (signed in, signed out, or an observer
//! failure) resolves the state for good. Observer failures are logged, turned
//! into a logged-out state and reported on the event bus; they never reach
//! callers as errors.
//!
//! ```no_run
//! use core_auth::SessionProvider;
//! use core_runtime::events::EventBus;
//! # use std::sync::Arc;
//! # async fn run(identity: Arc<dyn bridge_traits::IdentityProvider>) -> core_auth::Result<()> {
//! let provider = SessionProvider::new(identity, EventBus::new(100));
//! provider.start().await?;
//!
//! let state = provider.wait_until_resolved().await;
//! if let Some(user) = state.current_user {
//!     println!("signed in as {}", user.id);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::{SessionState, SessionUser};
use bridge_traits::{IdentityProvider, SessionChange, SessionSubscription};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

enum ObserverSlot {
    Idle,
    Running(JoinHandle<()>, CancellationToken),
    Stopped,
}

/// Process-wide holder of the current session.
pub struct SessionProvider {
    identity: Arc<dyn IdentityProvider>,
    event_bus: EventBus,
    state: watch::Sender<SessionState>,
    observer: Mutex<ObserverSlot>,
}

impl SessionProvider {
    pub fn new(identity: Arc<dyn IdentityProvider>, event_bus: EventBus) -> Self {
        let (state, _) = watch::channel(SessionState::resolving());
        Self {
            identity,
            event_bus,
            state,
            observer: Mutex::new(ObserverSlot::Idle),
        }
    }

    /// Subscribe to the identity provider's session observer.
    ///
    /// The subscription is taken exactly once; calling `start` again, even
    /// after [`shutdown`](Self::shutdown), fails with
    /// [`AuthError::AlreadyStarted`].
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        let mut slot = self.observer.lock().await;
        if !matches!(*slot, ObserverSlot::Idle) {
            return Err(AuthError::AlreadyStarted);
        }

        let subscription = self.identity.observe_session();
        let cancel = subscription.cancellation_token();
        let handle = tokio::spawn(observe(
            subscription,
            self.state.clone(),
            self.event_bus.clone(),
        ));

        *slot = ObserverSlot::Running(handle, cancel);
        info!("Session observer started");
        Ok(())
    }

    /// Detach from the session observer and wait for the observer task to end.
    ///
    /// The last known state stays readable.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        let mut slot = self.observer.lock().await;
        if let ObserverSlot::Running(handle, cancel) =
            std::mem::replace(&mut *slot, ObserverSlot::Stopped)
        {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "Session observer task ended abnormally");
            }
            info!("Session observer stopped");
        }
    }

    /// Current snapshot.
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receiver that is notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Wait until the first observation has been applied.
    pub async fn wait_until_resolved(&self) -> SessionState {
        let mut receiver = self.state.subscribe();
        let resolved = match receiver.wait_for(|state| !state.is_resolving).await {
            Ok(state) => state.clone(),
            // The sender lives as long as `self`; fall back to whatever is stored.
            Err(_) => self.state(),
        };
        resolved
    }

    pub fn current_user(&self) -> Option<SessionUser> {
        self.state.borrow().current_user.clone()
    }

    /// The signed-in user, or [`AuthError::NotAuthenticated`].
    pub fn require_user(&self) -> Result<SessionUser> {
        self.current_user().ok_or(AuthError::NotAuthenticated)
    }
}

impl Drop for SessionProvider {
    fn drop(&mut self) {
        if let Ok(slot) = self.observer.try_lock() {
            if let ObserverSlot::Running(_, cancel) = &*slot {
                cancel.cancel();
            }
        }
    }
}

async fn observe(
    mut subscription: SessionSubscription,
    state: watch::Sender<SessionState>,
    event_bus: EventBus,
) {
    while let Some(change) = subscription.recv().await {
        apply_change(&state, &event_bus, change);
    }

    if state.borrow().is_resolving {
        warn!("Session observer closed before the first observation");
        apply_change(
            &state,
            &event_bus,
            SessionChange::Error("session observer closed".to_string()),
        );
    }
    debug!("Session observer loop finished");
}

fn apply_change(state: &watch::Sender<SessionState>, event_bus: &EventBus, change: SessionChange) {
    let previous = state.borrow().clone();

    let next = match change {
        SessionChange::SignedIn(user) => SessionState::signed_in(SessionUser::from(user)),
        SessionChange::SignedOut => SessionState::signed_out(),
        SessionChange::Error(message) => {
            error!(error = %message, "Session observation failed");
            let failure = AuthError::ObservationFailed(message);
            let _ = event_bus.emit(CoreEvent::Auth(AuthEvent::AuthError {
                message: failure.to_string(),
                recoverable: true,
            }));
            SessionState::signed_out()
        }
    };

    state.send_replace(next.clone());

    let previous_id = previous.user_id().map(|id| id.to_string());
    let next_id = next.user_id().map(|id| id.to_string());

    if previous.is_resolving {
        info!(user_id = ?next_id, "Session resolved");
        let _ = event_bus.emit(CoreEvent::Auth(AuthEvent::SessionResolved {
            user_id: next_id.clone(),
        }));
    }

    if previous_id == next_id {
        return;
    }

    if let Some(user_id) = &previous_id {
        info!(user_id = %user_id, "User signed out");
        let _ = event_bus.emit(CoreEvent::Auth(AuthEvent::SignedOut {
            user_id: Some(user_id.clone()),
        }));
    }
    if let Some(user_id) = next_id {
        info!(user_id = %user_id, "User signed in");
        let _ = event_bus.emit(CoreEvent::Auth(AuthEvent::SignedIn { user_id }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{AuthUser, SessionPublisher};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeIdentity {
        publishers: StdMutex<Vec<SessionPublisher>>,
        subscribe_calls: AtomicUsize,
    }

    impl FakeIdentity {
        fn publish(&self, change: SessionChange) {
            for publisher in self.publishers.lock().unwrap().iter() {
                publisher.publish(change.clone());
            }
        }

        fn close(&self) {
            self.publishers.lock().unwrap().clear();
        }

        fn all_closed(&self) -> bool {
            self.publishers
                .lock()
                .unwrap()
                .iter()
                .all(SessionPublisher::is_closed)
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeIdentity {
        async fn sign_up(&self, _email: &str, _password: &str) -> BridgeResult<AuthUser> {
            unreachable!()
        }

        async fn sign_in(&self, _email: &str, _password: &str) -> BridgeResult<AuthUser> {
            unreachable!()
        }

        async fn sign_out(&self) -> BridgeResult<()> {
            unreachable!()
        }

        fn observe_session(&self) -> SessionSubscription {
            self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
            let (publisher, subscription) = SessionSubscription::channel();
            self.publishers.lock().unwrap().push(publisher);
            subscription
        }
    }

    fn setup() -> (Arc<FakeIdentity>, SessionProvider, EventBus) {
        let identity = Arc::new(FakeIdentity::default());
        let bus = EventBus::new(32);
        let provider = SessionProvider::new(identity.clone(), bus.clone());
        (identity, provider, bus)
    }

    async fn next_state(receiver: &mut watch::Receiver<SessionState>) -> SessionState {
        tokio::time::timeout(Duration::from_secs(1), receiver.changed())
            .await
            .expect("state change")
            .unwrap();
        receiver.borrow_and_update().clone()
    }

    #[tokio::test]
    async fn test_resolving_until_first_observation() {
        let (identity, provider, _bus) = setup();
        assert!(provider.state().is_resolving);

        provider.start().await.unwrap();
        assert!(provider.state().is_resolving);

        identity.publish(SessionChange::SignedIn(
            AuthUser::new("u1").with_email("a@b.co"),
        ));
        let state = provider.wait_until_resolved().await;

        assert!(!state.is_resolving);
        assert_eq!(state.user_id().map(|id| id.as_str()), Some("u1"));
        assert_eq!(provider.require_user().unwrap().email.as_deref(), Some("a@b.co"));
    }

    #[tokio::test]
    async fn test_start_subscribes_once() {
        let (identity, provider, _bus) = setup();

        provider.start().await.unwrap();
        assert!(matches!(provider.start().await, Err(AuthError::AlreadyStarted)));
        assert_eq!(identity.subscribe_calls.load(Ordering::SeqCst), 1);

        provider.shutdown().await;
        assert!(matches!(provider.start().await, Err(AuthError::AlreadyStarted)));
        assert_eq!(identity.subscribe_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_observer_error_resolves_logged_out() {
        let (identity, provider, bus) = setup();
        let mut events = bus.subscribe();
        provider.start().await.unwrap();

        identity.publish(SessionChange::Error("network down".to_string()));
        let state = provider.wait_until_resolved().await;

        assert_eq!(state, SessionState::signed_out());
        assert!(matches!(provider.require_user(), Err(AuthError::NotAuthenticated)));

        let first = events.recv().await.unwrap();
        assert!(matches!(
            first,
            CoreEvent::Auth(AuthEvent::AuthError { ref message, .. }) if message.contains("network down")
        ));
        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::SessionResolved { user_id: None })
        );
    }

    #[tokio::test]
    async fn test_transitions_emit_events() {
        let (identity, provider, bus) = setup();
        let mut events = bus.subscribe();
        let mut states = provider.subscribe();
        provider.start().await.unwrap();

        identity.publish(SessionChange::SignedOut);
        assert_eq!(next_state(&mut states).await, SessionState::signed_out());

        identity.publish(SessionChange::SignedIn(AuthUser::new("u1")));
        assert!(next_state(&mut states).await.is_signed_in());

        identity.publish(SessionChange::SignedIn(AuthUser::new("u2")));
        assert_eq!(
            next_state(&mut states).await.user_id().map(|id| id.as_str()),
            Some("u2")
        );

        identity.publish(SessionChange::SignedOut);
        assert!(!next_state(&mut states).await.is_signed_in());

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }
        assert_eq!(
            received,
            vec![
                CoreEvent::Auth(AuthEvent::SessionResolved { user_id: None }),
                CoreEvent::Auth(AuthEvent::SignedIn {
                    user_id: "u1".to_string()
                }),
                CoreEvent::Auth(AuthEvent::SignedOut {
                    user_id: Some("u1".to_string())
                }),
                CoreEvent::Auth(AuthEvent::SignedIn {
                    user_id: "u2".to_string()
                }),
                CoreEvent::Auth(AuthEvent::SignedOut {
                    user_id: Some("u2".to_string())
                }),
            ]
        );
    }

    #[tokio::test]
    async fn test_closed_observer_resolves_logged_out() {
        let (identity, provider, _bus) = setup();
        provider.start().await.unwrap();

        identity.close();
        let state = tokio::time::timeout(Duration::from_secs(1), provider.wait_until_resolved())
            .await
            .unwrap();

        assert_eq!(state, SessionState::signed_out());
    }

    #[tokio::test]
    async fn test_shutdown_unsubscribes_and_keeps_state() {
        let (identity, provider, _bus) = setup();
        provider.start().await.unwrap();
        identity.publish(SessionChange::SignedIn(AuthUser::new("u1")));
        provider.wait_until_resolved().await;

        provider.shutdown().await;

        assert!(identity.all_closed());
        identity.publish(SessionChange::SignedOut);
        assert!(provider.state().is_signed_in());
    }
}
