// Extraction adapter
//
// text -> oracle (JSON mode) -> response shape -> normalized records

use std::fmt;

use serde_json::{Map, Value};

use rekap_core::Record;

use crate::client::{Oracle, OracleError, OracleRequest};
use crate::normalize::Normalizer;

/// Fixed instruction sent with every extraction.
pub const SYSTEM_PROMPT: &str = r#"ROLE: You are a data parser engine.
TASK: Read the input text and convert the student records it mentions into JSON.

RULES:
1. Identify the entities: name (nama), student id (nim), score (nilai) and remark (keterangan).
2. Entities mentioned in the same sentence or context belong to ONE object.
3. The student id must be a string of the digits exactly as written.
4. Never copy words from these instructions (for example 'String Nomor'). Use real values only.
5. Never invent data. Only extract what the text states.
6. If you cannot extract anything, answer with {"data": []}. Never return the example below.

OUTPUT FORMAT (follow this structure):
{
    "data": [
        {
            "nama": "Budi Santoso",
            "nim": "101234",
            "nilai": 85,
            "keterangan": "Tugas Tambahan"
        }
    ]
}"#;

/// Accepted top-level shapes of a model answer.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape {
    /// `{"data": [ ... ]}`
    Wrapped(Vec<Value>),
    /// A bare object taken as one candidate
    Single(Map<String, Value>),
    /// A bare array of candidates
    List(Vec<Value>),
}

impl ResponseShape {
    /// Classify a parsed answer. `{"data": null}` counts as an empty list.
    pub fn classify(value: Value) -> Result<Self, ExtractionError> {
        match value {
            Value::Array(items) => Ok(ResponseShape::List(items)),
            Value::Object(mut map) => match map.remove("data") {
                Some(Value::Array(items)) => Ok(ResponseShape::Wrapped(items)),
                Some(Value::Null) => Ok(ResponseShape::Wrapped(Vec::new())),
                Some(other) => Err(ExtractionError::UnrecognizedShape(format!(
                    "\"data\" is {}, expected a list",
                    json_kind(&other)
                ))),
                None => Ok(ResponseShape::Single(map)),
            },
            other => Err(ExtractionError::UnrecognizedShape(format!(
                "top-level {} is not an object or list",
                json_kind(&other)
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResponseShape::Wrapped(_) => "wrapped",
            ResponseShape::Single(_) => "single",
            ResponseShape::List(_) => "list",
        }
    }

    /// Candidates in answer order.
    pub fn into_candidates(self) -> Vec<Value> {
        match self {
            ResponseShape::Wrapped(items) | ResponseShape::List(items) => items,
            ResponseShape::Single(map) => vec![Value::Object(map)],
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug)]
pub enum ExtractionError {
    /// Input text was blank; the oracle was not called
    EmptyInput,
    /// The oracle call failed
    Oracle(OracleError),
    /// The answer was not JSON
    Parse(String),
    /// The answer was JSON of an unsupported shape
    UnrecognizedShape(String),
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionError::EmptyInput => write!(f, "input text is empty"),
            ExtractionError::Oracle(e) => write!(f, "{}", e),
            ExtractionError::Parse(msg) => write!(f, "model answer is not valid JSON: {}", msg),
            ExtractionError::UnrecognizedShape(msg) => write!(f, "unrecognized model answer: {}", msg),
        }
    }
}

impl std::error::Error for ExtractionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExtractionError::Oracle(e) => Some(e),
            _ => None,
        }
    }
}

impl From<OracleError> for ExtractionError {
    fn from(e: OracleError) -> Self {
        ExtractionError::Oracle(e)
    }
}

/// Result of one extraction. An empty `records` is not an error.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub records: Vec<Record>,
    /// Candidates dropped by the normalizer
    pub rejected: usize,
    pub warnings: Vec<String>,
    /// Raw oracle answer, kept for diagnostics
    pub raw: String,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Parse a raw answer. Falls back to the outermost `{...}` or `[...]` span
/// when the text around it is not JSON; the span starting first is tried
/// first.
pub fn parse_response(raw: &str) -> Result<(ResponseShape, Vec<String>), ExtractionError> {
    let mut warnings = Vec::new();
    let value = match serde_json::from_str::<Value>(raw.trim()) {
        Ok(value) => value,
        Err(first) => {
            let value = embedded_json_spans(raw)
                .into_iter()
                .find_map(|span| serde_json::from_str::<Value>(span).ok())
                .ok_or_else(|| ExtractionError::Parse(first.to_string()))?;
            warnings.push("model wrapped its JSON in extra text; used the embedded JSON".to_string());
            value
        }
    };
    Ok((ResponseShape::classify(value)?, warnings))
}

fn embedded_json_spans(raw: &str) -> Vec<&str> {
    let mut spans: Vec<(usize, &str)> = [('{', '}'), ('[', ']')]
        .into_iter()
        .filter_map(|(open, close)| {
            let start = raw.find(open)?;
            let end = raw.rfind(close)?;
            (end > start).then(|| (start, &raw[start..=end]))
        })
        .collect();
    spans.sort_by_key(|(start, _)| *start);
    spans.into_iter().map(|(_, span)| span).collect()
}

/// Runs one oracle call per text and normalizes what comes back.
pub struct Extractor<O: Oracle> {
    oracle: O,
    normalizer: Normalizer,
}

impl<O: Oracle> Extractor<O> {
    pub fn new(oracle: O, normalizer: Normalizer) -> Self {
        Self { oracle, normalizer }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn extract(&self, text: &str) -> Result<Extraction, ExtractionError> {
        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyInput);
        }

        let request = OracleRequest {
            system: SYSTEM_PROMPT,
            user: text,
            json_mode: true,
        };
        log::debug!("extracting {} chars via {}", text.len(), self.oracle.label());
        let raw = self.oracle.complete(&request)?;

        let (shape, warnings) = parse_response(&raw)?;
        for warning in &warnings {
            log::warn!("{}", warning);
        }
        let shape_name = shape.name();

        let mut records = Vec::new();
        let mut rejected = 0;
        for candidate in shape.into_candidates() {
            match self.normalizer.normalize_value(&candidate) {
                Ok(record) => records.push(record),
                Err(reason) => {
                    log::debug!("dropped candidate ({}): {}", reason, candidate);
                    rejected += 1;
                }
            }
        }

        log::info!(
            "extracted {} record(s) from {} answer, {} rejected",
            records.len(),
            shape_name,
            rejected
        );
        Ok(Extraction { records, rejected, warnings, raw })
    }
}
