use serde::Serialize;
use thiserror::Error;

use crate::analysis::client::AnalyzeError;
use crate::analysis::interpret::InterpretError;
use crate::media::permissions::MediaPermission;
use crate::media::MediaError;

/// Blocking notice shown to the user; the only way pipeline failures surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no image selected")]
    NoMediaSelected,
    #[error(transparent)]
    Media(#[from] MediaError),
    #[error(transparent)]
    Analyze(#[from] AnalyzeError),
    #[error(transparent)]
    Interpret(#[from] InterpretError),
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Analyze(AnalyzeError::Cancelled))
    }

    /// The user has to pick media again before resubmitting.
    pub fn requires_reselect(&self) -> bool {
        matches!(
            self,
            PipelineError::Media(
                MediaError::Encoding(_) | MediaError::UnsupportedMedia(_) | MediaError::NotFound(_)
            )
        )
    }

    /// Parse-level failures whose raw payload is worth keeping in the logs.
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(
            self,
            PipelineError::Interpret(InterpretError::Parse { .. } | InterpretError::UnexpectedResponse)
        )
    }

    pub fn notice(&self) -> Notice {
        const GENERIC: &str = "Error";
        match self {
            PipelineError::NoMediaSelected => {
                Notice::new("No Image Selected", "Please select an image before sending.")
            }
            PipelineError::Media(MediaError::PermissionDenied(MediaPermission::Capture)) => {
                Notice::new(
                    "Permission Denied",
                    "You need to grant camera permissions to use this feature.",
                )
            }
            PipelineError::Media(MediaError::PermissionDenied(MediaPermission::Library)) => {
                Notice::new(
                    "Permission Denied",
                    "You need to grant gallery permissions to use this feature.",
                )
            }
            PipelineError::Media(MediaError::UnsupportedMedia(_)) => Notice::new(
                "Unsupported Media",
                "Only photos can be analyzed. Please select an image.",
            ),
            PipelineError::Media(
                MediaError::Encoding(_) | MediaError::NotFound(_) | MediaError::Unavailable(_),
            ) => Notice::new(
                GENERIC,
                "Could not read the selected image. Please select it again.",
            ),
            PipelineError::Analyze(_) => Notice::new(GENERIC, "Failed to communicate with server."),
            PipelineError::Interpret(InterpretError::ServerMessage(m)) => Notice::new(GENERIC, m.as_str()),
            PipelineError::Interpret(InterpretError::Parse { .. }) => {
                Notice::new(GENERIC, "Failed to parse data from server.")
            }
            PipelineError::Interpret(InterpretError::UnexpectedResponse) => {
                Notice::new(GENERIC, "Unexpected response from server.")
            }
            PipelineError::Interpret(InterpretError::EmptyResult) => {
                Notice::new(GENERIC, "Received empty or invalid data from server.")
            }
        }
    }
}
