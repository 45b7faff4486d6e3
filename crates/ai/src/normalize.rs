// Entity normalization: one loosely-typed candidate object in, one clean
// record (or a rejection) out.

use std::collections::HashMap;
use std::fmt;

use serde_json::{Map, Value};

use rekap_config::settings::DEFAULT_PLACEHOLDER_TOKENS;
use rekap_core::{canonical_id, parse_score, Field, Record, ValidationMode};

/// Why a candidate was dropped. Not an error: the batch just shrinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Candidate is not a JSON object
    NotAnObject,
    /// Strict mode and no valid id
    MissingId,
    /// Lenient mode and neither a valid id nor a name
    MissingIdAndName,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "candidate is not an object"),
            Self::MissingId => write!(f, "no valid id"),
            Self::MissingIdAndName => write!(f, "no valid id or name"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    mode: ValidationMode,
    placeholder_tokens: Vec<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(ValidationMode::Strict)
    }
}

impl Normalizer {
    pub fn new(mode: ValidationMode) -> Self {
        Self {
            mode,
            placeholder_tokens: DEFAULT_PLACEHOLDER_TOKENS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the placeholder words that invalidate an id.
    pub fn with_placeholder_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.placeholder_tokens = tokens
            .into_iter()
            .map(|t| t.into().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        self
    }

    /// Normalize any JSON value; only objects can become records.
    pub fn normalize_value(&self, candidate: &Value) -> Result<Record, Rejection> {
        match candidate {
            Value::Object(map) => self.normalize(map),
            _ => Err(Rejection::NotAnObject),
        }
    }

    pub fn normalize(&self, candidate: &Map<String, Value>) -> Result<Record, Rejection> {
        // First spelling of each lowercased key wins
        let mut keys: HashMap<String, &Value> = HashMap::new();
        for (key, value) in candidate {
            keys.entry(key.trim().to_lowercase()).or_insert(value);
        }

        let id = resolve(&keys, Field::Id)
            .and_then(value_to_text)
            .and_then(|raw| canonical_id(&raw))
            .filter(|id| !self.is_placeholder(id));
        let name = resolve(&keys, Field::Name).and_then(value_to_text);
        let score = resolve(&keys, Field::Score).and_then(value_to_score);
        let remark = resolve(&keys, Field::Remark)
            .and_then(value_to_text)
            .unwrap_or_default();

        match self.mode {
            ValidationMode::Strict if id.is_none() => return Err(Rejection::MissingId),
            ValidationMode::Lenient if id.is_none() && name.is_none() => {
                return Err(Rejection::MissingIdAndName)
            }
            _ => {}
        }

        Ok(Record {
            id: id.unwrap_or_default(),
            name,
            score,
            remark,
            extra: Default::default(),
        })
    }

    fn is_placeholder(&self, id: &str) -> bool {
        let lowered = id.to_lowercase();
        self.placeholder_tokens.iter().any(|token| lowered.contains(token.as_str()))
    }
}

/// First synonym (in priority order) holding a non-null, non-blank value.
fn resolve<'a>(keys: &HashMap<String, &'a Value>, field: Field) -> Option<&'a Value> {
    field
        .synonyms()
        .iter()
        .filter_map(|synonym| keys.get(*synonym).copied())
        .find(|value| match value {
            Value::Null => false,
            Value::String(s) => !s.trim().is_empty(),
            _ => true,
        })
}

fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(number_to_text(n)),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Literal digits of the number. A zero fraction is dropped so 105 and
/// 105.0 agree; anything else (exponents, real fractions) stays as written.
fn number_to_text(n: &serde_json::Number) -> String {
    let text = n.to_string();
    match text.split_once('.') {
        Some((int, frac))
            if !frac.is_empty()
                && frac.bytes().all(|b| b == b'0')
                && int.trim_start_matches('-').bytes().all(|b| b.is_ascii_digit()) =>
        {
            int.to_string()
        }
        _ => text,
    }
}

fn value_to_score(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()),
        Value::String(s) => parse_score(s),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn strict(value: Value) -> Result<Record, Rejection> {
        Normalizer::new(ValidationMode::Strict).normalize_value(&value)
    }

    fn lenient(value: Value) -> Result<Record, Rejection> {
        Normalizer::new(ValidationMode::Lenient).normalize_value(&value)
    }

    #[test]
    fn test_indonesian_keys() {
        let record = strict(json!({
            "nama": "Budi Santoso", "nim": "101234", "nilai": 85, "keterangan": "Tugas Tambahan"
        }))
        .unwrap();
        assert_eq!(record.id, "101234");
        assert_eq!(record.name.as_deref(), Some("Budi Santoso"));
        assert_eq!(record.score, Some(85.0));
        assert_eq!(record.remark, "Tugas Tambahan");
    }

    #[test]
    fn test_numeric_id_canonicalized() {
        assert_eq!(strict(json!({ "id": 105 })).unwrap().id, "105");
        assert_eq!(strict(json!({ "id": 105.0 })).unwrap().id, "105");
        assert_eq!(strict(json!({ "id": "105" })).unwrap().id, "105");
        assert_eq!(strict(json!({ "id": "00105" })).unwrap().id, "00105");
    }

    #[test]
    fn test_long_numeric_id_keeps_every_digit() {
        let candidate: Value = serde_json::from_str(r#"{"nim": 123456789012345678901}"#).unwrap();
        assert_eq!(strict(candidate).unwrap().id, "123456789012345678901");

        let candidate: Value = serde_json::from_str(r#"{"nim": 123456789012345678901.00}"#).unwrap();
        assert_eq!(strict(candidate).unwrap().id, "123456789012345678901");

        let candidate: Value = serde_json::from_str(r#"{"nim": 2210511042}"#).unwrap();
        assert_eq!(strict(candidate).unwrap().id, "2210511042");
    }

    #[test]
    fn test_synonym_priority_and_fallthrough() {
        let record = strict(json!({ "id": "2", "nim": "1" })).unwrap();
        assert_eq!(record.id, "1");

        // null or blank preferred synonym falls through to the next
        let record = strict(json!({ "nim": null, "id": "7" })).unwrap();
        assert_eq!(record.id, "7");
        let record = strict(json!({ "nim": "  ", "ID": "8" })).unwrap();
        assert_eq!(record.id, "8");
    }

    #[test]
    fn test_placeholder_id_rejected() {
        for id in ["String Nomor", "string", "<number>", "NOMOR_MAHASISWA"] {
            let err = strict(json!({ "name": "Andi", "id": id, "score": 80 })).unwrap_err();
            assert_eq!(err, Rejection::MissingId, "id {id:?} should be rejected");
        }
    }

    #[test]
    fn test_custom_placeholder_tokens() {
        let normalizer = Normalizer::new(ValidationMode::Strict).with_placeholder_tokens(["XXX"]);
        assert!(normalizer.normalize_value(&json!({ "id": "xxx-1" })).is_err());
        assert!(normalizer.normalize_value(&json!({ "id": "nomor 5" })).is_ok());
    }

    #[test]
    fn test_null_like_ids_rejected() {
        assert_eq!(strict(json!({ "id": "None" })).unwrap_err(), Rejection::MissingId);
        assert_eq!(strict(json!({ "id": "" })).unwrap_err(), Rejection::MissingId);
        assert_eq!(strict(json!({ "id": null, "name": "Andi" })).unwrap_err(), Rejection::MissingId);
        assert_eq!(strict(json!({ "id": ["105"] })).unwrap_err(), Rejection::MissingId);
    }

    #[test]
    fn test_lenient_keeps_name_only() {
        let record = lenient(json!({ "name": "Citra", "score": "77" })).unwrap();
        assert_eq!(record.id, "");
        assert_eq!(record.name.as_deref(), Some("Citra"));
        assert_eq!(record.score, Some(77.0));

        assert_eq!(lenient(json!({ "score": 77 })).unwrap_err(), Rejection::MissingIdAndName);
        assert_eq!(
            lenient(json!({ "id": "string", "remark": "x" })).unwrap_err(),
            Rejection::MissingIdAndName
        );
    }

    #[test]
    fn test_score_coercion() {
        assert_eq!(strict(json!({ "id": "1", "score": "92,5" })).unwrap().score, Some(92.5));
        assert_eq!(strict(json!({ "id": "1", "score": "delapan puluh" })).unwrap().score, None);
        assert_eq!(strict(json!({ "id": "1", "nilai": 0 })).unwrap().score, Some(0.0));
        assert_eq!(strict(json!({ "id": "1", "score": true })).unwrap().score, None);
    }

    #[test]
    fn test_remark_synonyms_and_default() {
        assert_eq!(strict(json!({ "id": "1", "note": "susulan" })).unwrap().remark, "susulan");
        assert_eq!(strict(json!({ "id": "1", "Remark": " revisi " })).unwrap().remark, "revisi");
        assert_eq!(strict(json!({ "id": "1" })).unwrap().remark, "");
    }

    #[test]
    fn test_non_object_rejected() {
        assert_eq!(strict(json!("105")).unwrap_err(), Rejection::NotAnObject);
        assert_eq!(strict(json!(null)).unwrap_err(), Rejection::NotAnObject);
    }
}
