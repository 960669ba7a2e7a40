pub mod sections;

use serde::Serialize;

use crate::analysis::dto::{AnalysisResult, Score};
use self::sections::Section;

pub const HARMFUL_THRESHOLD: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Harmful,
    RiskFree,
}

impl Verdict {
    /// `total < 50` is harmful. A missing total is not.
    pub fn of(score: &Score) -> Self {
        match score.total {
            Some(total) if total < HARMFUL_THRESHOLD => Verdict::Harmful,
            _ => Verdict::RiskFree,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Verdict::Harmful => "Harmful",
            Verdict::RiskFree => "Risk-Free",
        }
    }

    pub fn gauge_tint(self) -> &'static str {
        match self {
            Verdict::Harmful => "#FF4500",
            Verdict::RiskFree => "#32CD32",
        }
    }

    pub fn box_tint(self) -> &'static str {
        match self {
            Verdict::Harmful => "#FF6347",
            Verdict::RiskFree => "#2E8B57",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionLink {
    pub section: Section,
    pub title: &'static str,
}

/// Base result view: the gauge plus the buttons that open each section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreView {
    pub fill: f64,
    pub percent: u8,
    pub verdict: Verdict,
    pub verdict_label: &'static str,
    pub gauge_tint: &'static str,
    pub name: Option<String>,
    pub sections: Vec<SectionLink>,
}

pub fn score_view(result: &AnalysisResult) -> ScoreView {
    let fill = result.score.total.unwrap_or(0.0).clamp(0.0, 100.0);
    let verdict = Verdict::of(&result.score);
    ScoreView {
        fill,
        percent: fill.round() as u8,
        verdict,
        verdict_label: verdict.label(),
        gauge_tint: verdict.gauge_tint(),
        name: result.nutrition_info.name.clone(),
        sections: Section::ALL
            .iter()
            .map(|&section| SectionLink {
                section,
                title: section.title(),
            })
            .collect(),
    }
}
