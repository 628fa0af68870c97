//! # Host Bridge Traits
//!
//! Collaborator contracts the drive core consumes.
//!
//! ## Overview
//!
//! The core owns no persistence of its own. Authentication, object storage and
//! the metadata database are external services, reached through the traits in
//! this crate. Each backend (or test fake) ships concrete adapters.
//!
//! ## Traits
//!
//! ### Backend collaborators
//! - [`IdentityProvider`](identity::IdentityProvider) - Sign-up/sign-in/sign-out and a session observer
//! - [`BlobStore`](storage::BlobStore) - Path-keyed object storage with access URLs
//! - [`MetadataStore`](metadata::MetadataStore) - Per-owner file records
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry and TLS
//!
//! ### Utilities
//! - [`Clock`](clock::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](log::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required collaborator is
//! missing:
//!
//! ```ignore
//! use core_runtime::error::Error;
//!
//! let blob_store = builder.blob_store
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "BlobStore".to_string(),
//!         message: "No blob store provided. \
//!                  Use provider-firebase or inject a custom adapter.".to_string()
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Adapters
//! must map backend failures onto its kinds so the orchestrators can tell a
//! missing object (`NotFound`) from a rules rejection (`Unauthorized`) and
//! from any other fault.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so the core can share adapters
//! across concurrently running uploads.

pub mod clock;
pub mod error;
pub mod http;
pub mod identity;
pub mod log;
pub mod metadata;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use identity::{AuthUser, IdentityProvider, SessionChange, SessionPublisher, SessionSubscription};
pub use metadata::{FileDocument, InsertedDocument, MetadataStore, StoredDocument};
pub use storage::{AccessUrl, BlobMetadata, BlobStore, LocalFile, ProgressReporter, TransferProgress};
pub use clock::{Clock, SystemClock};
pub use log::{LogEntry, LogLevel, LoggerSink};
