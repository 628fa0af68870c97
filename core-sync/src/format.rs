//! Display helpers for file listings.

use serde::{Deserialize, Serialize};

const UNITS: [&str; 9] = ["Bytes", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Human-readable size using powers of 1024, trailing zeros dropped.
///
/// ```
/// use core_sync::format_bytes;
///
/// assert_eq!(format_bytes(0, 2), "0 Bytes");
/// assert_eq!(format_bytes(1536, 2), "1.5 KB");
/// assert_eq!(format_bytes(1_048_576, 2), "1 MB");
/// ```
pub fn format_bytes(bytes: u64, decimals: usize) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{:.*}", decimals, value);
    let trimmed = if rounded.contains('.') {
        rounded.trim_end_matches('0').trim_end_matches('.')
    } else {
        rounded.as_str()
    };
    format!("{} {}", trimmed, UNITS[unit])
}

/// Icon category of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    Image,
    Video,
    Audio,
    Document,
    Archive,
    Other,
}

impl FileKind {
    pub fn from_content_type(content_type: &str) -> Self {
        let content_type = content_type.to_ascii_lowercase();
        if content_type.starts_with("image/") {
            FileKind::Image
        } else if content_type.starts_with("video/") {
            FileKind::Video
        } else if content_type.starts_with("audio/") {
            FileKind::Audio
        } else if content_type == "application/pdf" || content_type.contains("text") {
            FileKind::Document
        } else if content_type.contains("zip") || content_type.contains("archive") {
            FileKind::Archive
        } else {
            FileKind::Other
        }
    }
}
