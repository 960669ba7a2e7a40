use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Which device capability a permission request is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaPermission {
    Capture,
    Library,
}

#[async_trait]
pub trait PermissionGate: Send + Sync {
    async fn request_capture(&self) -> PermissionStatus;
    async fn request_library(&self) -> PermissionStatus;
}

/// Grants fixed at startup from configuration.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermissions {
    pub capture: bool,
    pub library: bool,
}

impl StaticPermissions {
    pub fn allow_all() -> Self {
        Self {
            capture: true,
            library: true,
        }
    }
}

fn status(granted: bool) -> PermissionStatus {
    if granted {
        PermissionStatus::Granted
    } else {
        PermissionStatus::Denied
    }
}

#[async_trait]
impl PermissionGate for StaticPermissions {
    async fn request_capture(&self) -> PermissionStatus {
        status(self.capture)
    }

    async fn request_library(&self) -> PermissionStatus {
        status(self.library)
    }
}
