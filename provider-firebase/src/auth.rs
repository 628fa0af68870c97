//! Firebase Authentication over the identity toolkit REST API
//!
//! Email/password accounts only. The session lives in memory: the id token is
//! refreshed through the secure token endpoint shortly before it expires, and
//! every change is published to the live session subscriptions.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bridge_traits::identity::{
    AuthUser, IdentityProvider, SessionChange, SessionPublisher, SessionSubscription,
};
use bridge_traits::clock::{Clock, SystemClock};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::FirebaseConfig;
use crate::error::{auth_error_code, error_message, FirebaseError, Result};
use crate::rest::{self, Retry, TokenSource};
use crate::types::{AuthResponse, PasswordRequest, RefreshResponse};

/// Refresh this long before the id token actually expires
const REFRESH_MARGIN_SECS: i64 = 300;

/// Lifetime assumed when the backend sends an unreadable `expiresIn`
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

struct Session {
    user: AuthUser,
    id_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl Session {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now
    }
}

enum TokenState {
    SignedOut,
    Fresh(String),
    Stale { uid: String, refresh_token: String },
}

#[derive(Default)]
struct AuthState {
    session: Option<Session>,
    observers: Vec<SessionPublisher>,
}

impl AuthState {
    fn publish(&mut self, change: SessionChange) {
        self.observers
            .retain(|observer| observer.publish(change.clone()));
    }

    fn current_change(&self) -> SessionChange {
        match &self.session {
            Some(session) => SessionChange::SignedIn(session.user.clone()),
            None => SessionChange::SignedOut,
        }
    }
}

/// Email/password identity provider backed by Firebase Authentication.
///
/// # Example
///
/// ```ignore
/// use provider_firebase::{FirebaseAuth, FirebaseConfig};
/// use bridge_traits::identity::IdentityProvider;
///
/// let auth = FirebaseAuth::new(&FirebaseConfig::from_env()?, http_client);
/// let user = auth.sign_in("ada@example.com", "secret1").await?;
/// ```
pub struct FirebaseAuth {
    http_client: Arc<dyn HttpClient>,
    api_key: String,
    identity_base: String,
    token_base: String,
    clock: Arc<dyn Clock>,
    state: Mutex<AuthState>,
    /// Serializes token refreshes
    refresh_lock: tokio::sync::Mutex<()>,
}

impl FirebaseAuth {
    pub fn new(config: &FirebaseConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            api_key: config.api_key.clone(),
            identity_base: config.endpoints.identity.trim_end_matches('/').to_string(),
            token_base: config.endpoints.token.trim_end_matches('/').to_string(),
            clock: Arc::new(SystemClock),
            state: Mutex::new(AuthState::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The signed-in user, if any.
    pub fn current_user(&self) -> Option<AuthUser> {
        self.state
            .lock()
            .session
            .as_ref()
            .map(|session| session.user.clone())
    }

    async fn password_request(
        &self,
        endpoint: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthResponse> {
        let url = format!(
            "{}/v1/accounts:{}?key={}",
            self.identity_base,
            endpoint,
            urlencoding::encode(&self.api_key)
        );
        let request = HttpRequest::new(HttpMethod::Post, url).json(&PasswordRequest {
            email,
            password,
            return_secure_token: true,
        })?;

        let response = rest::execute(self.http_client.as_ref(), request, Retry::Never).await?;
        if response.status == 400 {
            let message = error_message(&response.body).unwrap_or_default();
            return Err(FirebaseError::AuthenticationFailed {
                code: auth_error_code(&message),
            });
        }
        let response = rest::expect_success(response, endpoint)?;
        rest::parse(&response)
    }

    fn establish(&self, response: AuthResponse) -> AuthUser {
        let user = AuthUser {
            uid: response.local_id,
            email: response.email,
            display_name: response.display_name.filter(|name| !name.is_empty()),
        };
        let session = Session {
            user: user.clone(),
            id_token: response.id_token,
            refresh_token: response.refresh_token,
            expires_at: self.expiry(&response.expires_in),
        };

        let mut state = self.state.lock();
        state.session = Some(session);
        state.publish(SessionChange::SignedIn(user.clone()));
        user
    }

    fn expiry(&self, expires_in: &str) -> DateTime<Utc> {
        let seconds = expires_in
            .parse::<i64>()
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        self.clock.now() + Duration::seconds(seconds)
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<RefreshResponse> {
        let url = format!(
            "{}/v1/token?key={}",
            self.token_base,
            urlencoding::encode(&self.api_key)
        );
        let request = HttpRequest::new(HttpMethod::Post, url)
            .form(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token)]);

        let response = rest::execute(self.http_client.as_ref(), request, Retry::Backoff).await?;
        if response.status == 400 {
            let message = error_message(&response.body).unwrap_or_default();
            return Err(FirebaseError::AuthenticationFailed {
                code: auth_error_code(&message),
            });
        }
        let response = rest::expect_success(response, "token")?;
        rest::parse(&response)
    }

    fn token_state(&self) -> TokenState {
        let now = self.clock.now();
        let state = self.state.lock();
        match state.session.as_ref() {
            None => TokenState::SignedOut,
            Some(session) if session.is_fresh(now) => TokenState::Fresh(session.id_token.clone()),
            Some(session) => TokenState::Stale {
                uid: session.user.uid.clone(),
                refresh_token: session.refresh_token.clone(),
            },
        }
    }

    #[instrument(skip(self, refresh_token))]
    async fn refresh(&self, uid: &str, refresh_token: &str) -> Result<Option<String>> {
        match self.exchange_refresh_token(refresh_token).await {
            Ok(refreshed) => {
                let expires_at = self.expiry(&refreshed.expires_in);
                let mut state = self.state.lock();
                match state.session.as_mut() {
                    Some(session) if session.user.uid == uid && refreshed.user_id == uid => {
                        session.id_token = refreshed.id_token.clone();
                        session.refresh_token = refreshed.refresh_token;
                        session.expires_at = expires_at;
                        debug!("Id token refreshed");
                        Ok(Some(refreshed.id_token))
                    }
                    // Signed out or switched user while the exchange was in flight.
                    _ => Ok(state.session.as_ref().map(|s| s.id_token.clone())),
                }
            }
            Err(FirebaseError::AuthenticationFailed { code }) => {
                warn!(code = %code, "Refresh token rejected, ending session");
                let mut state = self.state.lock();
                if state.session.as_ref().is_some_and(|s| s.user.uid == uid) {
                    state.session = None;
                    state.publish(SessionChange::Error(format!("Session expired: {}", code)));
                }
                Err(FirebaseError::SessionExpired(code))
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl TokenSource for FirebaseAuth {
    async fn id_token(&self) -> Result<Option<String>> {
        match self.token_state() {
            TokenState::SignedOut => return Ok(None),
            TokenState::Fresh(token) => return Ok(Some(token)),
            TokenState::Stale { .. } => {}
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        match self.token_state() {
            TokenState::SignedOut => Ok(None),
            TokenState::Fresh(token) => Ok(Some(token)),
            TokenState::Stale { uid, refresh_token } => self.refresh(&uid, &refresh_token).await,
        }
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuth {
    #[instrument(skip_all)]
    async fn sign_up(&self, email: &str, password: &str) -> BridgeResult<AuthUser> {
        let response = self
            .password_request("signUp", email, password)
            .await
            .map_err(|e| {
                warn!(error = %e, "Sign-up rejected");
                BridgeError::from(e)
            })?;
        let user = self.establish(response);
        info!(uid = %user.uid, "Account created");
        Ok(user)
    }

    #[instrument(skip_all)]
    async fn sign_in(&self, email: &str, password: &str) -> BridgeResult<AuthUser> {
        let response = self
            .password_request("signInWithPassword", email, password)
            .await
            .map_err(|e| {
                warn!(error = %e, "Sign-in rejected");
                BridgeError::from(e)
            })?;
        let user = self.establish(response);
        info!(uid = %user.uid, "Signed in");
        Ok(user)
    }

    async fn sign_out(&self) -> BridgeResult<()> {
        let mut state = self.state.lock();
        if let Some(session) = state.session.take() {
            info!(uid = %session.user.uid, "Signed out");
        }
        state.publish(SessionChange::SignedOut);
        Ok(())
    }

    fn observe_session(&self) -> SessionSubscription {
        let (publisher, subscription) = SessionSubscription::channel();
        let mut state = self.state.lock();
        publisher.publish(state.current_change());
        state.observers.retain(|observer| !observer.is_closed());
        state.observers.push(publisher);
        subscription
    }
}
