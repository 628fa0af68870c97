//! # Drive Runtime
//!
//! Shared plumbing for the drive crates:
//! - [`config`]: `DriveConfig`, the builder that collects the injected
//!   bridges and settings and refuses to build without the required ones
//! - [`events`]: the broadcast `EventBus` and the `CoreEvent`/`Notification`
//!   vocabulary the presentation shell consumes
//! - [`logging`]: `tracing-subscriber` setup with host forwarding and PII
//!   redaction

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
