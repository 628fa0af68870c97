//! Credential operations observed through the session provider.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{AuthUser, IdentityProvider, SessionChange, SessionPublisher, SessionSubscription};
use core_auth::{AuthError, AuthManager, SessionProvider};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory identity service that pushes session changes to its observers.
#[derive(Default)]
struct InMemoryIdentity {
    accounts: Mutex<Vec<(String, String, String)>>,
    observers: Mutex<Vec<SessionPublisher>>,
    current: Mutex<Option<AuthUser>>,
}

impl InMemoryIdentity {
    fn broadcast(&self, change: SessionChange) {
        self.observers
            .lock()
            .unwrap()
            .retain(|publisher| publisher.publish(change.clone()));
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentity {
    async fn sign_up(&self, email: &str, password: &str) -> BridgeResult<AuthUser> {
        let user = {
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.iter().any(|(e, _, _)| e == email) {
                return Err(BridgeError::InvalidInput("EMAIL_EXISTS".to_string()));
            }
            let uid = format!("uid-{}", accounts.len() + 1);
            accounts.push((email.to_string(), password.to_string(), uid.clone()));
            AuthUser::new(uid).with_email(email)
        };
        *self.current.lock().unwrap() = Some(user.clone());
        self.broadcast(SessionChange::SignedIn(user.clone()));
        Ok(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> BridgeResult<AuthUser> {
        let user = self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .find(|(e, p, _)| e == email && p == password)
            .map(|(e, _, uid)| AuthUser::new(uid.clone()).with_email(e.clone()))
            .ok_or_else(|| BridgeError::Unauthorized("INVALID_LOGIN_CREDENTIALS".to_string()))?;
        *self.current.lock().unwrap() = Some(user.clone());
        self.broadcast(SessionChange::SignedIn(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> BridgeResult<()> {
        *self.current.lock().unwrap() = None;
        self.broadcast(SessionChange::SignedOut);
        Ok(())
    }

    fn observe_session(&self) -> SessionSubscription {
        let (publisher, subscription) = SessionSubscription::channel();
        let initial = match self.current.lock().unwrap().clone() {
            Some(user) => SessionChange::SignedIn(user),
            None => SessionChange::SignedOut,
        };
        publisher.publish(initial);
        self.observers.lock().unwrap().push(publisher);
        subscription
    }
}

async fn wait_for_user(provider: &SessionProvider, expected: Option<&str>) {
    let mut receiver = provider.subscribe();
    tokio::time::timeout(
        Duration::from_secs(1),
        receiver.wait_for(|state| {
            !state.is_resolving && state.user_id().map(|id| id.as_str()) == expected
        }),
    )
    .await
    .expect("session reached expected user")
    .unwrap();
}

#[tokio::test]
async fn test_sign_up_sign_out_sign_in_roundtrip() {
    let identity = Arc::new(InMemoryIdentity::default());
    let bus = EventBus::new(64);
    let mut events = bus.subscribe();
    let session = SessionProvider::new(identity.clone(), bus.clone());
    let auth = AuthManager::new(identity.clone(), bus.clone());

    session.start().await.unwrap();
    assert!(session.wait_until_resolved().await.current_user.is_none());

    let user = auth.sign_up("jane@example.com", "secret1").await.unwrap();
    wait_for_user(&session, Some(user.id.as_str())).await;
    assert_eq!(session.require_user().unwrap().initials(), "JA");

    auth.sign_out().await.unwrap();
    wait_for_user(&session, None).await;
    assert!(matches!(session.require_user(), Err(AuthError::NotAuthenticated)));

    auth.sign_in("jane@example.com", "secret1").await.unwrap();
    wait_for_user(&session, Some(user.id.as_str())).await;

    session.shutdown().await;

    let mut auth_events = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Auth(event) = event {
            auth_events.push(event);
        }
    }
    assert_eq!(
        auth_events,
        vec![
            AuthEvent::SessionResolved { user_id: None },
            AuthEvent::SignedIn {
                user_id: "uid-1".to_string()
            },
            AuthEvent::SignedOut {
                user_id: Some("uid-1".to_string())
            },
            AuthEvent::SignedIn {
                user_id: "uid-1".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_rejected_credentials_leave_session_untouched() {
    let identity = Arc::new(InMemoryIdentity::default());
    let bus = EventBus::new(64);
    let session = SessionProvider::new(identity.clone(), bus.clone());
    let auth = AuthManager::new(identity.clone(), bus);

    session.start().await.unwrap();
    session.wait_until_resolved().await;

    auth.sign_up("jane@example.com", "secret1").await.unwrap();
    assert!(matches!(
        auth.sign_up("jane@example.com", "another1").await,
        Err(AuthError::InvalidCredentials(reason)) if reason == "EMAIL_EXISTS"
    ));
    assert!(matches!(
        auth.sign_in("jane@example.com", "wrong-password").await,
        Err(AuthError::InvalidCredentials(_))
    ));

    wait_for_user(&session, Some("uid-1")).await;
}
