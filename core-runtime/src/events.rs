//! # Events
//!
//! Everything the presentation shell reacts to travels over one
//! `tokio::sync::broadcast` channel as a [`CoreEvent`]:
//!
//! ```text
//! SessionProvider ──┐
//! FileCatalog ──────┼── emit ──> EventBus ── subscribe ──> shell
//! orchestrators ────┘
//! ```
//!
//! Publishers never depend on a listener. `emit` fails when nobody is
//! subscribed and every call site discards that error. A subscriber that falls
//! more than the buffer size behind gets `RecvError::Lagged` and keeps going
//! from the oldest retained event.
//!
//! [`Notification`] is the user-facing part: one message per terminal outcome
//! (upload batch, delete, preview, credential failure) naming the files
//! concerned.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Auth(AuthEvent),
    Files(FileEvent),
    Upload(UploadEvent),
    Notification(Notification),
}

impl CoreEvent {
    pub fn as_notification(&self) -> Option<&Notification> {
        match self {
            CoreEvent::Notification(notification) => Some(notification),
            _ => None,
        }
    }
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// First observation after the provider started.
    SessionResolved { user_id: Option<String> },
    SignedIn { user_id: String },
    SignedOut { user_id: Option<String> },
    /// The observer or a credential operation failed.
    AuthError { message: String, recoverable: bool },
}

// ============================================================================
// File list
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum FileEvent {
    ListRefreshed {
        owner_id: String,
        file_count: usize,
    },
    /// The previous list stays visible.
    RefreshFailed { owner_id: String, message: String },
    FileAdded {
        record_id: String,
        name: String,
        size_bytes: u64,
    },
    FileRemoved { record_id: String, name: String },
    /// Emptied on sign-out.
    Cleared,
}

// ============================================================================
// Uploads
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum UploadEvent {
    BatchStarted { batch_id: String, file_count: usize },
    /// `percent` never decreases for a given file.
    Progress {
        batch_id: String,
        file_name: String,
        percent: u8,
    },
    FileFinished {
        batch_id: String,
        file_name: String,
        success: bool,
        error: Option<String>,
    },
    BatchCompleted {
        batch_id: String,
        succeeded: usize,
        failed: usize,
    },
}

// ============================================================================
// Notifications
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
    /// Display names of the files concerned
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
}

impl Notification {
    pub fn new(level: NotificationLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
            files: Vec::new(),
        }
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Success, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, title, message)
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == NotificationLevel::Error
    }
}

// ============================================================================
// Bus
// ============================================================================

/// Cloneable handle to the broadcast channel.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, FileEvent};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let bus = EventBus::new(16);
/// let mut shell = bus.subscribe();
///
/// bus.emit(CoreEvent::Files(FileEvent::Cleared)).ok();
/// assert_eq!(shell.recv().await.unwrap(), CoreEvent::Files(FileEvent::Cleared));
/// # }
/// ```
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// `capacity` events are retained per subscriber before it lags.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Number of subscribers reached, or an error when there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn notify(&self, notification: Notification) {
        let _ = self.emit(CoreEvent::Notification(notification));
    }

    /// Receives events emitted from now on; nothing is replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
