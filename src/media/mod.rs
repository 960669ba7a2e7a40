pub mod acquire;
pub mod model;
pub mod permissions;
pub mod transcode;

use thiserror::Error;

use self::model::MediaKind;
use self::permissions::MediaPermission;

#[derive(Debug, Clone, Error)]
pub enum MediaError {
    #[error("{0:?} permission denied")]
    PermissionDenied(MediaPermission),
    #[error("unsupported media kind {0:?}")]
    UnsupportedMedia(MediaKind),
    #[error("media not found: {0}")]
    NotFound(String),
    #[error("encoding failed: {0}")]
    Encoding(String),
    #[error("media library unavailable: {0}")]
    Unavailable(String),
}
