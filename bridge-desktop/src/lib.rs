//! # Desktop Bridge Implementations
//!
//! Default native implementations of the host-side bridges (macOS, Windows,
//! Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`, consumed by the backend providers
//! - `TokioFileLoader` turning picked paths into uploadable files, with the
//!   MIME type guessed by `mime_guess`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, TokioFileLoader};
//!
//! #[tokio::main]
//! async fn main() -> bridge_traits::error::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let files = TokioFileLoader::new().load_all(&["report.pdf"]).await?;
//!
//!     // Hand both to the drive configuration
//!     Ok(())
//! }
//! ```

mod filesystem;
mod http;

pub use filesystem::TokioFileLoader;
pub use http::ReqwestHttpClient;
