use serde::{Deserialize, Serialize};

use super::Verdict;
use crate::analysis::dto::AnalysisResult;

pub const NOT_AVAILABLE: &str = "Data not available";

/// Drill-down categories. At most one is open at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    ProcessedChemicals,
    VulnerableGroups,
    NutritionInfo,
    AlternativeRecipes,
    AdditionalNutrients,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Section::ProcessedChemicals,
        Section::VulnerableGroups,
        Section::NutritionInfo,
        Section::AlternativeRecipes,
        Section::AdditionalNutrients,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Section::ProcessedChemicals => "Processed Chemicals",
            Section::VulnerableGroups => "Vulnerable Groups",
            Section::NutritionInfo => "Nutrition Info",
            Section::AlternativeRecipes => "Alternative Recipes",
            Section::AdditionalNutrients => "Additional Nutrients",
        }
    }

    fn empty_message(self) -> &'static str {
        match self {
            Section::ProcessedChemicals => "No processed chemicals detected.",
            Section::VulnerableGroups => "No vulnerable groups specified.",
            Section::NutritionInfo => NOT_AVAILABLE,
            Section::AlternativeRecipes => "No alternative recipes available.",
            Section::AdditionalNutrients => "No additional nutrients specified.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemView {
    pub title: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactView {
    pub label: String,
    pub value: String,
    pub background: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SectionBody {
    Items { items: Vec<ItemView> },
    Facts { facts: Vec<FactView> },
    Empty { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionView {
    pub section: Section,
    pub title: &'static str,
    pub body: SectionBody,
}

pub fn render_section(result: &AnalysisResult, section: Section) -> SectionView {
    let items: Vec<ItemView> = match section {
        Section::ProcessedChemicals => result
            .processed_chemicals
            .iter()
            .map(|c| ItemView {
                title: c.chemical_name.clone(),
                lines: vec![
                    format!("Function in Food: {}", c.function_in_food),
                    format!("Non-Food Industrial Uses: {}", c.non_food_industrial_uses),
                ],
            })
            .collect(),
        Section::VulnerableGroups => result
            .nutrition_info
            .vulnerable_groups
            .avoid_if
            .iter()
            .map(|g| ItemView {
                title: g.group.clone(),
                lines: vec![format!("Reason: {}", g.reason)],
            })
            .collect(),
        Section::AlternativeRecipes => result
            .alternative_recipes
            .iter()
            .map(|r| ItemView {
                title: r.name.clone(),
                lines: vec![r.description.clone()],
            })
            .collect(),
        Section::AdditionalNutrients => result
            .nutrition_info
            .additional_nutrients
            .iter()
            .map(|n| ItemView {
                title: n.name.clone(),
                lines: vec![format!("Amount: {}", n.amount)],
            })
            .collect(),
        Section::NutritionInfo => {
            return SectionView {
                section,
                title: section.title(),
                body: SectionBody::Facts {
                    facts: nutrition_facts(result),
                },
            }
        }
    };

    let body = if items.is_empty() {
        SectionBody::Empty {
            message: section.empty_message().to_string(),
        }
    } else {
        SectionBody::Items { items }
    };
    SectionView {
        section,
        title: section.title(),
        body,
    }
}

fn nutrition_facts(result: &AnalysisResult) -> Vec<FactView> {
    let background = Verdict::of(&result.score).box_tint();
    result
        .nutrition_info
        .facts()
        .into_iter()
        .map(|(key, value)| FactView {
            label: capitalize(key),
            value: value
                .map(|v| v.to_string())
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            background,
        })
        .collect()
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
