use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::lenient::{lenient, lenient_vec, opt_number, opt_text, text};

/// Outbound body of the analysis call.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisRequest {
    pub image_data_base64: String,
    pub text: String,
}

/// Raw response body, before interpretation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisEnvelope {
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default, deserialize_with = "opt_text")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NutrientValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for NutrientValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NutrientValue::Number(n) => write!(f, "{}", n),
            NutrientValue::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Score {
    #[serde(default, deserialize_with = "opt_number")]
    pub total: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub criteria: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Nutrient {
    #[serde(default, deserialize_with = "text")]
    pub name: String,
    #[serde(default, deserialize_with = "text")]
    pub amount: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AvoidIf {
    #[serde(default, deserialize_with = "text")]
    pub group: String,
    #[serde(default, deserialize_with = "text")]
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VulnerableGroups {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub avoid_if: Vec<AvoidIf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedChemical {
    #[serde(default, deserialize_with = "text")]
    pub chemical_name: String,
    #[serde(default, deserialize_with = "text")]
    pub function_in_food: String,
    #[serde(default, deserialize_with = "text")]
    pub non_food_industrial_uses: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlternativeRecipe {
    #[serde(default, deserialize_with = "text")]
    pub name: String,
    #[serde(default, deserialize_with = "text")]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NutritionInfo {
    pub name: Option<String>,
    pub calories: Option<NutrientValue>,
    pub fat: Option<NutrientValue>,
    pub sugar: Option<NutrientValue>,
    pub protein: Option<NutrientValue>,
    pub carbohydrates: Option<NutrientValue>,
    pub fiber: Option<NutrientValue>,
    pub sodium: Option<NutrientValue>,
    pub cholesterol: Option<NutrientValue>,
    pub additional_nutrients: Vec<Nutrient>,
    pub vulnerable_groups: VulnerableGroups,
}

impl NutritionInfo {
    /// The eight headline facts, in display order.
    pub fn facts(&self) -> [(&'static str, Option<&NutrientValue>); 8] {
        [
            ("calories", self.calories.as_ref()),
            ("fat", self.fat.as_ref()),
            ("sugar", self.sugar.as_ref()),
            ("protein", self.protein.as_ref()),
            ("carbohydrates", self.carbohydrates.as_ref()),
            ("fiber", self.fiber.as_ref()),
            ("sodium", self.sodium.as_ref()),
            ("cholesterol", self.cholesterol.as_ref()),
        ]
    }
}

/// Interpreted analysis, driving the result view.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub score: Score,
    pub nutrition_info: NutritionInfo,
    pub processed_chemicals: Vec<ProcessedChemical>,
    pub alternative_recipes: Vec<AlternativeRecipe>,
}

/// Wire shape as the service sends it. Lists show up either at the top level
/// or nested under `nutrition_info`, depending on the service revision.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct AnalysisResultRow {
    #[serde(default, deserialize_with = "lenient")]
    pub score: Score,
    #[serde(default, deserialize_with = "lenient")]
    pub nutrition_info: NutritionInfoRow,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub processed_chemicals: Vec<ProcessedChemical>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub alternative_recipes: Vec<AlternativeRecipe>,
    #[serde(default, deserialize_with = "lenient")]
    pub vulnerable_groups: VulnerableGroups,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NutritionInfoRow {
    #[serde(default, deserialize_with = "opt_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub calories: Option<NutrientValue>,
    #[serde(default, deserialize_with = "lenient")]
    pub fat: Option<NutrientValue>,
    #[serde(default, deserialize_with = "lenient")]
    pub sugar: Option<NutrientValue>,
    #[serde(default, deserialize_with = "lenient")]
    pub protein: Option<NutrientValue>,
    #[serde(default, deserialize_with = "lenient")]
    pub carbohydrates: Option<NutrientValue>,
    #[serde(default, deserialize_with = "lenient")]
    pub fiber: Option<NutrientValue>,
    #[serde(default, deserialize_with = "lenient")]
    pub sodium: Option<NutrientValue>,
    #[serde(default, deserialize_with = "lenient")]
    pub cholesterol: Option<NutrientValue>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub additional_nutrients: Vec<Nutrient>,
    #[serde(default, deserialize_with = "lenient")]
    pub vulnerable_groups: VulnerableGroups,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub processed_chemicals: Vec<ProcessedChemical>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub alternative_recipes: Vec<AlternativeRecipe>,
}

fn prefer<T>(top: Vec<T>, nested: Vec<T>) -> Vec<T> {
    if top.is_empty() {
        nested
    } else {
        top
    }
}

impl From<AnalysisResultRow> for AnalysisResult {
    fn from(r: AnalysisResultRow) -> Self {
        let n = r.nutrition_info;
        let avoid_if = prefer(r.vulnerable_groups.avoid_if, n.vulnerable_groups.avoid_if);
        Self {
            score: r.score,
            nutrition_info: NutritionInfo {
                name: n.name,
                calories: n.calories,
                fat: n.fat,
                sugar: n.sugar,
                protein: n.protein,
                carbohydrates: n.carbohydrates,
                fiber: n.fiber,
                sodium: n.sodium,
                cholesterol: n.cholesterol,
                additional_nutrients: n.additional_nutrients,
                vulnerable_groups: VulnerableGroups { avoid_if },
            },
            processed_chemicals: prefer(r.processed_chemicals, n.processed_chemicals),
            alternative_recipes: prefer(r.alternative_recipes, n.alternative_recipes),
        }
    }
}

#[cfg(test)]
mod dto_tests {
    use super::*;
    use serde_json::json;

    fn coerce(v: Value) -> AnalysisResult {
        serde_json::from_value::<AnalysisResultRow>(v).unwrap().into()
    }

    #[test]
    fn request_serializes_wire_names() {
        let body = serde_json::to_value(AnalysisRequest {
            image_data_base64: "abc".into(),
            text: String::new(),
        })
        .unwrap();
        assert_eq!(body, json!({"image_data_base64": "abc", "text": ""}));
    }

    #[test]
    fn envelope_null_content_is_absent() {
        let env: AnalysisEnvelope = serde_json::from_str(r#"{"content":null}"#).unwrap();
        assert!(env.content.is_none());
        assert!(env.message.is_none());
    }

    #[test]
    fn wrong_types_degrade_to_defaults() {
        let r = coerce(json!({
            "score": {"total": "61", "criteria": "n/a"},
            "nutrition_info": {
                "name": 7,
                "calories": {"value": 1},
                "fat": "3g",
                "additional_nutrients": [{"name": "Iron", "amount": 2}, "junk"],
            },
            "processed_chemicals": "none",
            "alternative_recipes": [{"name": "Salad"}],
        }));
        assert_eq!(r.score.total, Some(61.0));
        assert!(r.score.criteria.is_empty());
        assert_eq!(r.nutrition_info.name.as_deref(), Some("7"));
        assert_eq!(r.nutrition_info.calories, None);
        assert_eq!(r.nutrition_info.fat, Some(NutrientValue::Text("3g".into())));
        assert_eq!(
            r.nutrition_info.additional_nutrients,
            vec![Nutrient { name: "Iron".into(), amount: "2".into() }]
        );
        assert!(r.processed_chemicals.is_empty());
        assert_eq!(r.alternative_recipes[0].description, "");
    }

    #[test]
    fn nested_lists_are_hoisted() {
        let r = coerce(json!({
            "nutrition_info": {
                "processed_chemicals": [{"chemical_name": "E621"}],
                "alternative_recipes": [{"name": "Baked chips"}],
                "vulnerable_groups": {"avoid_if": [{"group": "Kids", "reason": "sugar"}]},
            }
        }));
        assert_eq!(r.processed_chemicals[0].chemical_name, "E621");
        assert_eq!(r.alternative_recipes[0].name, "Baked chips");
        assert_eq!(r.nutrition_info.vulnerable_groups.avoid_if[0].group, "Kids");
    }

    #[test]
    fn top_level_lists_win() {
        let r = coerce(json!({
            "vulnerable_groups": {"avoid_if": [{"group": "Diabetics", "reason": "sugar"}]},
            "nutrition_info": {
                "vulnerable_groups": {"avoid_if": [{"group": "Kids", "reason": "salt"}]},
            }
        }));
        let groups = &r.nutrition_info.vulnerable_groups.avoid_if;
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].group, "Diabetics");
    }

    #[test]
    fn nutrient_display() {
        assert_eq!(NutrientValue::Number(95.0).to_string(), "95");
        assert_eq!(NutrientValue::Number(0.5).to_string(), "0.5");
        assert_eq!(NutrientValue::Text("12 mg".into()).to_string(), "12 mg");
    }
}
