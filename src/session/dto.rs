use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::machine::{Phase, Screen, ScreenState};
use crate::error::Notice;
use crate::media::model::MediaKind;
use crate::presenter::sections::{render_section, Section, SectionView};
use crate::presenter::{score_view, ScoreView};

#[derive(Debug, Deserialize)]
pub struct PickRequest {
    /// Absent when the user dismissed the picker.
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SectionRequest {
    pub section: Section,
}

#[derive(Debug, Serialize)]
pub struct LibraryResponse {
    pub items: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MediaView {
    pub uri: String,
    pub kind: MediaKind,
    pub content_type: Option<String>,
    /// Known for captured frames; library files are read at submit time.
    pub byte_len: Option<usize>,
}

/// Everything a client needs to draw the screen.
#[derive(Debug, Serialize)]
pub struct ScreenView {
    pub id: Uuid,
    pub phase: Phase,
    pub busy: bool,
    pub media: Option<MediaView>,
    pub prompt: String,
    pub notice: Option<Notice>,
    pub score: Option<ScoreView>,
    pub active_section: Option<SectionView>,
    pub fallback_text: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&Screen> for ScreenView {
    fn from(s: &Screen) -> Self {
        let state = s.state();
        let (score, active_section, fallback_text) = match state {
            ScreenState::Result {
                result, section, ..
            } => (
                Some(score_view(result)),
                section.map(|sec| render_section(result, sec)),
                None,
            ),
            ScreenState::Fallback { text, .. } => (None, None, Some(text.clone())),
            _ => (None, None, None),
        };
        Self {
            id: s.id,
            phase: state.phase(),
            busy: s.is_busy(),
            media: state.media().map(|m| MediaView {
                uri: m.uri.clone(),
                kind: m.kind,
                content_type: m.content_type.clone(),
                byte_len: m.byte_len(),
            }),
            prompt: s.prompt().to_string(),
            notice: s.notice().cloned(),
            score,
            active_section,
            fallback_text,
            updated_at: s.updated_at,
        }
    }
}
