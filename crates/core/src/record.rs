use std::collections::BTreeMap;

use serde::Serialize;

/// One student entity, either freshly extracted or loaded from the store.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Record {
    /// Merge key in canonical text form. Empty only for lenient-mode
    /// candidates that carried a name but no usable id.
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub remark: String,
    /// Store columns that are not one of the logical fields, by column key
    /// (the header, suffixed `#2`, `#3`... when a header repeats). Never
    /// filled by extraction; carried through rewrites untouched.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = remark.into();
        self
    }

    /// The canonical merge key, or `None` if this record cannot be keyed.
    pub fn key(&self) -> Option<String> {
        canonical_id(&self.id)
    }
}

/// Canonical text form of an id: trimmed, never numerically reinterpreted.
/// Returns `None` for empty and null-like values.
pub fn canonical_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.to_lowercase().as_str() {
        "none" | "null" | "nan" => None,
        _ => Some(trimmed.to_string()),
    }
}

/// Parse a score cell or model value. Accepts a decimal comma ("85,5").
pub fn parse_score(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = if trimmed.contains('.') {
        trimmed.to_string()
    } else {
        trimmed.replacen(',', ".", 1)
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Render a score for the store: integral values without a fraction,
/// never in scientific notation.
pub fn format_score(score: f64) -> String {
    if score.fract() == 0.0 && score.abs() < 1e15 {
        format!("{}", score as i64)
    } else {
        format!("{}", score)
    }
}
