use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

impl MediaKind {
    pub fn from_mime(ct: &str) -> Self {
        let ct = ct.trim().to_ascii_lowercase();
        if ct.starts_with("image/") {
            MediaKind::Image
        } else if ct.starts_with("video/") {
            MediaKind::Video
        } else {
            MediaKind::Other
        }
    }

    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("jpg" | "jpeg" | "png" | "webp" | "gif" | "heic") => MediaKind::Image,
            Some("mp4" | "mov" | "m4v" | "webm" | "avi") => MediaKind::Video,
            _ => MediaKind::Other,
        }
    }
}

/// One captured or picked item. Either holds its bytes (capture upload) or
/// points at a library file that is read when the image is encoded.
#[derive(Debug, Clone)]
pub struct CapturedMedia {
    pub uri: String,
    pub kind: MediaKind,
    pub content_type: Option<String>,
    pub bytes: Option<Bytes>,
}

impl CapturedMedia {
    pub fn from_upload(uri: String, content_type: &str, body: Bytes) -> Self {
        Self {
            uri,
            kind: MediaKind::from_mime(content_type),
            content_type: Some(content_type.to_string()),
            bytes: Some(body),
        }
    }

    pub fn from_file(path: &Path) -> Self {
        Self {
            uri: format!("file://{}", path.display()),
            kind: MediaKind::from_path(path),
            content_type: None,
            bytes: None,
        }
    }

    /// Filesystem path for `file://` media.
    pub fn local_path(&self) -> Option<PathBuf> {
        self.uri.strip_prefix("file://").map(PathBuf::from)
    }

    pub fn byte_len(&self) -> Option<usize> {
        self.bytes.as_ref().map(|b| b.len())
    }
}

/// Outcome of a capture or pick. Closing the picker is not an error.
#[derive(Debug, Clone)]
pub enum Acquisition {
    Selected(CapturedMedia),
    Cancelled,
}
