use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::model::{Acquisition, CapturedMedia};
use super::permissions::{MediaPermission, PermissionGate, PermissionStatus};
use super::MediaError;

/// A frame handed over by the capture UI.
pub struct CaptureUpload<'a> {
    pub body: Bytes,
    pub content_type: &'a str,
}

/// Gallery backed by a directory. Entries are addressed by bare file name.
#[derive(Debug, Clone)]
pub struct MediaLibrary {
    root: PathBuf,
}

impl MediaLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn list(&self) -> Result<Vec<String>, MediaError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MediaError::Unavailable(e.to_string())),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MediaError::Unavailable(e.to_string()))?
        {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            if let (true, Some(name)) = (is_file, entry.file_name().to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    async fn resolve(&self, name: &str) -> Result<PathBuf, MediaError> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name.contains("..") {
            return Err(MediaError::NotFound(name.to_string()));
        }
        let path = self.root.join(name);
        match tokio::fs::metadata(&path).await {
            Ok(m) if m.is_file() => {}
            _ => return Err(MediaError::NotFound(name.to_string())),
        }
        Ok(tokio::fs::canonicalize(&path).await.unwrap_or(path))
    }
}

/// Takes the frame the capture UI produced. `None`, or an empty frame, means
/// the user closed the camera.
pub async fn capture_from_device(
    gate: &dyn PermissionGate,
    upload: Option<CaptureUpload<'_>>,
) -> Result<Acquisition, MediaError> {
    if gate.request_capture().await == PermissionStatus::Denied {
        warn!("capture permission denied");
        return Err(MediaError::PermissionDenied(MediaPermission::Capture));
    }

    let Some(upload) = upload.filter(|u| !u.body.is_empty()) else {
        debug!("capture cancelled");
        return Ok(Acquisition::Cancelled);
    };

    let ext = ext_from_mime(upload.content_type).unwrap_or("bin");
    let uri = format!("capture://{}.{}", Uuid::new_v4(), ext);
    info!(%uri, bytes = upload.body.len(), content_type = upload.content_type, "frame captured");
    Ok(Acquisition::Selected(CapturedMedia::from_upload(
        uri,
        upload.content_type,
        upload.body,
    )))
}

/// Picks a file from the library. `None` means the picker was dismissed.
pub async fn pick_from_library(
    gate: &dyn PermissionGate,
    library: &MediaLibrary,
    name: Option<&str>,
) -> Result<Acquisition, MediaError> {
    if gate.request_library().await == PermissionStatus::Denied {
        warn!("library permission denied");
        return Err(MediaError::PermissionDenied(MediaPermission::Library));
    }

    let Some(name) = name else {
        debug!("library pick cancelled");
        return Ok(Acquisition::Cancelled);
    };

    let path = library.resolve(name).await?;
    let media = CapturedMedia::from_file(&path);
    info!(uri = %media.uri, kind = ?media.kind, "library item picked");
    Ok(Acquisition::Selected(media))
}

pub(crate) fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "image/gif" => Some("gif"),
        "video/mp4" => Some("mp4"),
        "video/quicktime" => Some("mov"),
        _ => None,
    }
}

#[cfg(test)]
mod acquire_tests {
    use super::*;
    use crate::media::model::MediaKind;
    use crate::media::permissions::StaticPermissions;

    fn deny_all() -> StaticPermissions {
        StaticPermissions {
            capture: false,
            library: false,
        }
    }

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("video/quicktime"), Some("mov"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[tokio::test]
    async fn capture_denied_produces_no_media() {
        let upload = CaptureUpload {
            body: Bytes::from_static(b"\xff\xd8"),
            content_type: "image/jpeg",
        };
        let err = capture_from_device(&deny_all(), Some(upload)).await.unwrap_err();
        assert!(matches!(err, MediaError::PermissionDenied(MediaPermission::Capture)));
    }

    #[tokio::test]
    async fn capture_without_frame_is_cancelled() {
        let gate = StaticPermissions::allow_all();
        let out = capture_from_device(&gate, None).await.unwrap();
        assert!(matches!(out, Acquisition::Cancelled));

        let empty = CaptureUpload {
            body: Bytes::new(),
            content_type: "image/jpeg",
        };
        let out = capture_from_device(&gate, Some(empty)).await.unwrap();
        assert!(matches!(out, Acquisition::Cancelled));
    }

    #[tokio::test]
    async fn capture_keeps_bytes_and_kind() {
        let gate = StaticPermissions::allow_all();
        let upload = CaptureUpload {
            body: Bytes::from_static(b"not really a video"),
            content_type: "video/mp4",
        };
        let Acquisition::Selected(media) = capture_from_device(&gate, Some(upload)).await.unwrap()
        else {
            panic!("expected media");
        };
        assert!(media.uri.starts_with("capture://"));
        assert!(media.uri.ends_with(".mp4"));
        assert_eq!(media.kind, MediaKind::Video);
        assert_eq!(media.byte_len(), Some(18));
    }

    #[tokio::test]
    async fn library_pick_and_list() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.png"), b"x").unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let library = MediaLibrary::new(dir.path());

        assert_eq!(library.list().await.unwrap(), vec!["a.jpg", "b.png"]);

        let gate = StaticPermissions::allow_all();
        let Acquisition::Selected(media) =
            pick_from_library(&gate, &library, Some("a.jpg")).await.unwrap()
        else {
            panic!("expected media");
        };
        assert_eq!(media.kind, MediaKind::Image);
        assert!(media.local_path().unwrap().ends_with("a.jpg"));

        let out = pick_from_library(&gate, &library, None).await.unwrap();
        assert!(matches!(out, Acquisition::Cancelled));
    }

    #[tokio::test]
    async fn library_rejects_traversal_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        let library = MediaLibrary::new(dir.path());
        let gate = StaticPermissions::allow_all();

        for name in ["../etc/passwd", "a/b.jpg", "..", "missing.jpg", "nested\\x.png"] {
            let err = pick_from_library(&gate, &library, Some(name)).await.unwrap_err();
            assert!(matches!(err, MediaError::NotFound(_)), "{name}");
        }
    }

    #[tokio::test]
    async fn library_denied() {
        let dir = tempfile::tempdir().unwrap();
        let library = MediaLibrary::new(dir.path());
        let err = pick_from_library(&deny_all(), &library, Some("a.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::PermissionDenied(MediaPermission::Library)));
    }

    #[tokio::test]
    async fn unreadable_library_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("plain.txt");
        std::fs::write(&not_a_dir, b"x").unwrap();

        let err = MediaLibrary::new(&not_a_dir).list().await.unwrap_err();
        assert!(matches!(err, MediaError::Unavailable(_)));
    }

    #[tokio::test]
    async fn missing_library_dir_lists_empty() {
        let library = MediaLibrary::new("/definitely/not/here/foodlens");
        assert!(library.list().await.unwrap().is_empty());
    }
}
