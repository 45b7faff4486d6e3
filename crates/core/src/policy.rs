// Tunable behavior shared between extraction, merge, and settings.

use serde::{Deserialize, Serialize};

/// Which normalized candidates survive into a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationMode {
    /// Keep a candidate only if it has a valid id.
    #[default]
    Strict,
    /// Keep a candidate if it has a valid id or a name.
    Lenient,
}

impl ValidationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Lenient => "lenient",
        }
    }
}

/// How an incoming record overwrites a stored one with the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Overwrite only fields the incoming record supplies; keep the rest.
    #[default]
    FieldWise,
    /// Overwrite name, score and remark wholesale, absent values included.
    Replace,
}

impl MergePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FieldWise => "field_wise",
            Self::Replace => "replace",
        }
    }
}
