//! # Core Authentication
//!
//! Session tracking and email/password credential operations.
//!
//! - [`SessionProvider`] holds the single subscription to the identity
//!   provider's session observer and exposes the current [`SessionState`].
//! - [`AuthManager`] performs sign-up, sign-in and sign-out, validating
//!   credentials locally first.

pub mod error;
pub mod manager;
pub mod session;
pub mod types;

pub use error::{AuthError, Result};
pub use manager::AuthManager;
pub use session::SessionProvider;
pub use types::{Credentials, SessionState, SessionUser, UserId};
