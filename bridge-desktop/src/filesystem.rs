//! Local File Loading using Tokio
//!
//! Turns paths picked on the desktop into [`LocalFile`]s ready for upload.

use bridge_traits::{
    error::{BridgeError, Result},
    storage::LocalFile,
};
use bytes::Bytes;
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Reads files from disk and guesses their MIME type from the extension.
#[derive(Debug, Clone, Default)]
pub struct TokioFileLoader {
    max_bytes: Option<u64>,
}

impl TokioFileLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject files larger than `max_bytes` before reading them.
    pub fn with_max_bytes(max_bytes: u64) -> Self {
        Self {
            max_bytes: Some(max_bytes),
        }
    }

    /// Load one file. The name is the final path component.
    pub async fn load(&self, path: &Path) -> Result<LocalFile> {
        let metadata = fs::metadata(path).await?;
        if metadata.is_dir() {
            return Err(BridgeError::InvalidInput(format!(
                "{} is a directory",
                path.display()
            )));
        }
        if let Some(max) = self.max_bytes {
            if metadata.len() > max {
                return Err(BridgeError::InvalidInput(format!(
                    "{} is {} bytes, limit is {}",
                    path.display(),
                    metadata.len(),
                    max
                )));
            }
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                BridgeError::InvalidInput(format!("{} has no usable file name", path.display()))
            })?
            .to_string();

        let bytes = fs::read(path).await?;
        let mut file = LocalFile::new(name, Bytes::from(bytes));
        if let Some(mime) = mime_guess::from_path(path).first() {
            file = file.with_content_type(mime.essence_str());
        }

        debug!(path = ?path, size = file.size(), content_type = ?file.content_type, "Loaded local file");
        Ok(file)
    }

    /// Load several files, stopping at the first unreadable one.
    pub async fn load_all<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<LocalFile>> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            files.push(self.load(path.as_ref()).await?);
        }
        Ok(files)
    }
}
