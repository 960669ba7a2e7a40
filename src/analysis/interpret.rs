use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

use super::dto::{AnalysisEnvelope, AnalysisResult, AnalysisResultRow};

/// What the `content` field of an envelope turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentShape {
    DirectObject(Map<String, Value>),
    /// A string that parsed as JSON on its own.
    JsonString(Value),
    /// A string carrying a ```json fenced block; holds the parsed block.
    FencedJson(Value),
    PlainString(String),
    Unsupported(Value),
    Absent { message: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    Structured(AnalysisResult),
    /// Unparseable text shown as-is.
    Fallback(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InterpretError {
    #[error("server message: {0}")]
    ServerMessage(String),
    #[error("unexpected response shape")]
    UnexpectedResponse,
    #[error("content is not parseable JSON")]
    Parse { raw: String },
    #[error("empty analysis result")]
    EmptyResult,
}

lazy_static! {
    static ref FENCED_JSON_RE: Regex = Regex::new(r"(?si)```json[ \t]*\r?\n?(.*?)```").unwrap();
}

pub fn classify(envelope: &AnalysisEnvelope) -> ContentShape {
    let absent = || ContentShape::Absent {
        message: envelope
            .message
            .as_ref()
            .filter(|m| !m.trim().is_empty())
            .cloned(),
    };
    match &envelope.content {
        Some(v) if is_blank(v) => absent(),
        None => absent(),
        Some(Value::Object(map)) => ContentShape::DirectObject(map.clone()),
        Some(Value::String(s)) => classify_text(s),
        Some(other) => ContentShape::Unsupported(other.clone()),
    }
}

/// `null`, `false`, `0` and blank strings carry nothing to show.
fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

fn classify_text(s: &str) -> ContentShape {
    if let Ok(v) = serde_json::from_str::<Value>(s) {
        return ContentShape::JsonString(v);
    }
    extract_fenced_json(s)
        .map(ContentShape::FencedJson)
        .unwrap_or_else(|| ContentShape::PlainString(s.to_string()))
}

/// Parses the first ```json block in `s` that holds valid JSON.
pub fn extract_fenced_json(s: &str) -> Option<Value> {
    FENCED_JSON_RE
        .captures_iter(s)
        .filter_map(|c| c.get(1))
        .find_map(|inner| serde_json::from_str::<Value>(inner.as_str().trim()).ok())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Interpreter {
    pub fallback_text: bool,
}

impl Interpreter {
    pub fn interpret(&self, envelope: &AnalysisEnvelope) -> Result<Interpretation, InterpretError> {
        match classify(envelope) {
            ContentShape::Absent { message: Some(m) } => Err(InterpretError::ServerMessage(m)),
            ContentShape::Absent { message: None } => Err(InterpretError::UnexpectedResponse),
            ContentShape::DirectObject(map) => coerce(map).map(Interpretation::Structured),
            ContentShape::JsonString(Value::Object(map))
            | ContentShape::FencedJson(Value::Object(map)) => {
                coerce(map).map(Interpretation::Structured)
            }
            ContentShape::JsonString(_) | ContentShape::FencedJson(_) => {
                Err(InterpretError::UnexpectedResponse)
            }
            ContentShape::PlainString(raw) if self.fallback_text => {
                Ok(Interpretation::Fallback(raw))
            }
            ContentShape::PlainString(raw) => Err(InterpretError::Parse { raw }),
            ContentShape::Unsupported(_) => Err(InterpretError::UnexpectedResponse),
        }
    }
}

fn coerce(map: Map<String, Value>) -> Result<AnalysisResult, InterpretError> {
    if map.is_empty() {
        return Err(InterpretError::EmptyResult);
    }
    serde_json::from_value::<AnalysisResultRow>(Value::Object(map))
        .map(AnalysisResult::from)
        .map_err(|_| InterpretError::UnexpectedResponse)
}
