use serde::Serialize;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::analysis::dto::AnalysisResult;
use crate::analysis::interpret::Interpretation;
use crate::error::{Notice, PipelineError};
use crate::media::model::CapturedMedia;
use crate::presenter::sections::Section;

#[derive(Debug, Clone)]
pub enum ScreenState {
    Idle,
    MediaSelected {
        media: CapturedMedia,
    },
    Submitting {
        media: CapturedMedia,
        ticket: u64,
    },
    Result {
        media: CapturedMedia,
        result: AnalysisResult,
        section: Option<Section>,
    },
    /// Unparseable analysis text shown as-is.
    Fallback {
        media: CapturedMedia,
        text: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    MediaSelected,
    Submitting,
    Result,
    Fallback,
}

impl ScreenState {
    pub fn phase(&self) -> Phase {
        match self {
            ScreenState::Idle => Phase::Idle,
            ScreenState::MediaSelected { .. } => Phase::MediaSelected,
            ScreenState::Submitting { .. } => Phase::Submitting,
            ScreenState::Result { .. } => Phase::Result,
            ScreenState::Fallback { .. } => Phase::Fallback,
        }
    }

    pub fn media(&self) -> Option<&CapturedMedia> {
        match self {
            ScreenState::Idle => None,
            ScreenState::MediaSelected { media }
            | ScreenState::Submitting { media, .. }
            | ScreenState::Result { media, .. }
            | ScreenState::Fallback { media, .. } => Some(media),
        }
    }
}

#[derive(Debug)]
pub enum Action {
    MediaAcquired(CapturedMedia),
    /// Acquisition failed before any media was produced.
    AcquisitionFailed(PipelineError),
    SetPrompt(String),
    Submit,
    Finished {
        ticket: u64,
        outcome: Result<Interpretation, PipelineError>,
    },
    SelectSection(Section),
    DismissSection,
    DismissNotice,
    Reset,
    Teardown,
}

/// Everything the pipeline needs for one submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub ticket: u64,
    pub media: CapturedMedia,
    pub prompt: String,
    pub cancel: CancellationToken,
}

#[derive(Debug)]
pub enum Effect {
    None,
    Analyze(Submission),
    /// The action does not apply in the current state; nothing changed.
    Rejected(&'static str),
}

#[derive(Debug)]
pub struct Screen {
    pub id: Uuid,
    pub owner: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    state: ScreenState,
    prompt: String,
    notice: Option<Notice>,
    next_ticket: u64,
    cancel: Option<CancellationToken>,
}

impl Screen {
    pub fn new(owner: Uuid) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            owner,
            created_at: now,
            updated_at: now,
            state: ScreenState::Idle,
            prompt: String::new(),
            notice: None,
            next_ticket: 1,
            cancel: None,
        }
    }

    pub fn state(&self) -> &ScreenState {
        &self.state
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, ScreenState::Submitting { .. })
    }

    pub fn apply(&mut self, action: Action) -> Effect {
        let before = self.state.phase();
        let effect = self.reduce(action);
        if !matches!(effect, Effect::Rejected(_)) {
            self.updated_at = OffsetDateTime::now_utc();
        }
        debug!(screen_id = %self.id, from = ?before, to = ?self.state.phase(), "screen transition");
        effect
    }

    fn reduce(&mut self, action: Action) -> Effect {
        match action {
            Action::MediaAcquired(media) => {
                if self.is_busy() {
                    return Effect::Rejected("analysis in progress");
                }
                self.prompt.clear();
                self.notice = None;
                self.state = ScreenState::MediaSelected { media };
                Effect::None
            }
            Action::AcquisitionFailed(err) => {
                self.notice = Some(err.notice());
                Effect::None
            }
            Action::SetPrompt(text) => {
                if self.is_busy() {
                    return Effect::Rejected("analysis in progress");
                }
                self.prompt = text;
                Effect::None
            }
            Action::Submit => self.submit(),
            Action::Finished { ticket, outcome } => {
                self.finish(ticket, outcome);
                Effect::None
            }
            Action::SelectSection(section) => match &mut self.state {
                ScreenState::Result { section: active, .. } => {
                    *active = Some(section);
                    Effect::None
                }
                _ => Effect::Rejected("no analysis result to drill into"),
            },
            Action::DismissSection => {
                if let ScreenState::Result { section, .. } = &mut self.state {
                    *section = None;
                }
                Effect::None
            }
            Action::DismissNotice => {
                self.notice = None;
                Effect::None
            }
            Action::Reset | Action::Teardown => {
                if let Some(token) = self.cancel.take() {
                    token.cancel();
                }
                self.state = ScreenState::Idle;
                self.prompt.clear();
                self.notice = None;
                Effect::None
            }
        }
    }

    fn submit(&mut self) -> Effect {
        let media = match &self.state {
            ScreenState::Idle => {
                self.notice = Some(PipelineError::NoMediaSelected.notice());
                return Effect::None;
            }
            ScreenState::Submitting { .. } => return Effect::Rejected("analysis in progress"),
            ScreenState::Result { .. } | ScreenState::Fallback { .. } => {
                return Effect::Rejected("reset before submitting again")
            }
            ScreenState::MediaSelected { media } => media.clone(),
        };

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());
        self.notice = None;
        self.state = ScreenState::Submitting {
            media: media.clone(),
            ticket,
        };
        Effect::Analyze(Submission {
            ticket,
            media,
            prompt: self.prompt.clone(),
            cancel,
        })
    }

    fn finish(&mut self, ticket: u64, outcome: Result<Interpretation, PipelineError>) {
        let media = match &self.state {
            ScreenState::Submitting { media, ticket: current } if *current == ticket => media.clone(),
            _ => {
                debug!(screen_id = %self.id, ticket, "discarding stale analysis outcome");
                return;
            }
        };
        self.cancel = None;

        self.state = match outcome {
            Ok(Interpretation::Structured(result)) => ScreenState::Result {
                media,
                result,
                section: None,
            },
            Ok(Interpretation::Fallback(text)) => ScreenState::Fallback { media, text },
            Err(err) if err.is_cancelled() => ScreenState::MediaSelected { media },
            Err(err) => {
                warn!(screen_id = %self.id, ticket, error = %err, "analysis failed");
                self.notice = Some(err.notice());
                if err.requires_reselect() {
                    self.prompt.clear();
                    ScreenState::Idle
                } else {
                    ScreenState::MediaSelected { media }
                }
            }
        };
    }
}
