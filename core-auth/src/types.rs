use bridge_traits::AuthUser;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AuthError, Result};

/// Identifier of an authenticated user, as assigned by the identity provider.
///
/// Every file record and blob path is scoped by this value.
///
/// # Examples
///
/// ```
/// use core_auth::UserId;
///
/// let id = UserId::new("kZ3fq0");
/// assert_eq!(id.as_str(), "kZ3fq0");
/// assert_eq!(id.to_string(), "kZ3fq0");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The signed-in user exposed to the rest of the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl SessionUser {
    /// Two upper-case letters for an avatar, taken from the email's local part.
    ///
    /// ```
    /// use core_auth::{SessionUser, UserId};
    ///
    /// let user = SessionUser { id: UserId::new("u1"), email: Some("jane@example.com".into()), display_name: None };
    /// assert_eq!(user.initials(), "JA");
    /// ```
    pub fn initials(&self) -> String {
        let local = self
            .email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .unwrap_or_default();
        let initials: String = local.chars().take(2).collect::<String>().to_uppercase();
        if initials.is_empty() {
            "FD".to_string()
        } else {
            initials
        }
    }
}

impl From<AuthUser> for SessionUser {
    fn from(user: AuthUser) -> Self {
        Self {
            id: UserId::new(user.uid),
            email: user.email,
            display_name: user.display_name,
        }
    }
}

/// Process-wide session signal.
///
/// `is_resolving` stays `true` until the identity provider has reported the
/// initial session (or failed to), so callers can tell "not signed in" apart
/// from "not known yet".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub current_user: Option<SessionUser>,
    pub is_resolving: bool,
}

impl SessionState {
    pub fn resolving() -> Self {
        Self {
            current_user: None,
            is_resolving: true,
        }
    }

    pub fn signed_in(user: SessionUser) -> Self {
        Self {
            current_user: Some(user),
            is_resolving: false,
        }
    }

    pub fn signed_out() -> Self {
        Self {
            current_user: None,
            is_resolving: false,
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.current_user.is_some()
    }

    pub fn user_id(&self) -> Option<&UserId> {
        self.current_user.as_ref().map(|user| &user.id)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::resolving()
    }
}

const MIN_PASSWORD_LEN: usize = 6;

/// Email and password checked locally before any network call.
///
/// The `Debug` implementation never prints the password.
#[derive(Clone)]
pub struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let email = email.into().trim().to_string();
        let password = password.into();

        if !is_plausible_email(&email) {
            return Err(AuthError::InvalidCredentials(
                "Please enter a valid email address.".to_string(),
            ));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::InvalidCredentials(format!(
                "Password must be at least {} characters.",
                MIN_PASSWORD_LEN
            )));
        }

        Ok(Self { email, password })
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}
