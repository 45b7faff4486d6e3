// Application settings
// Loaded from ~/.config/rekap/settings.json (or $REKAP_CONFIG)

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use rekap_core::{MergePolicy, ValidationMode};

/// Environment variable that overrides the settings file location
pub const CONFIG_ENV: &str = "REKAP_CONFIG";

/// Store file used when neither settings nor flags name one.
pub const DEFAULT_STORE_FILE: &str = "data_akademik.csv";

/// Placeholder words a model copies from the field descriptions instead of
/// extracting a real id.
pub const DEFAULT_PLACEHOLDER_TOKENS: &[&str] = &["string", "number", "nomor"];

/// AI provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AIProvider {
    /// Extraction disabled
    None,
    /// Local model via Ollama (default)
    #[default]
    Local,
    /// OpenAI API
    #[serde(rename = "openai")]
    OpenAI,
}

impl AIProvider {
    /// Returns true if extraction is enabled
    pub fn is_enabled(&self) -> bool {
        !matches!(self, AIProvider::None)
    }

    pub fn needs_api_key(&self) -> bool {
        matches!(self, AIProvider::OpenAI)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AIProvider::None => "none",
            AIProvider::Local => "local",
            AIProvider::OpenAI => "openai",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "none" => Some(AIProvider::None),
            "local" | "ollama" => Some(AIProvider::Local),
            "openai" => Some(AIProvider::OpenAI),
            _ => None,
        }
    }

    /// Returns the default model for this provider
    pub fn default_model(&self) -> &'static str {
        match self {
            AIProvider::None => "",
            AIProvider::Local => "llama3.2",
            AIProvider::OpenAI => "gpt-4o-mini",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            AIProvider::None => "",
            AIProvider::Local => "http://localhost:11434",
            AIProvider::OpenAI => "https://api.openai.com",
        }
    }
}

/// AI-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AISettings {
    /// Selected AI provider
    pub provider: AIProvider,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Custom endpoint (Ollama URL, or an OpenAI-compatible base URL)
    pub endpoint: Option<String>,

    /// Upper bound for one extraction call, in seconds
    pub timeout_secs: u64,
}

impl Default for AISettings {
    fn default() -> Self {
        Self {
            provider: AIProvider::Local,
            model: String::new(), // Empty = use provider default
            endpoint: None,
            timeout_secs: 120,
        }
    }
}

impl AISettings {
    /// Get the effective model (user-specified or provider default)
    pub fn effective_model(&self) -> &str {
        if self.model.is_empty() {
            self.provider.default_model()
        } else {
            &self.model
        }
    }

    /// Get the effective endpoint (user-specified or provider default)
    pub fn effective_endpoint(&self) -> &str {
        match self.endpoint.as_deref() {
            Some(endpoint) if !endpoint.trim().is_empty() => endpoint.trim_end_matches('/'),
            _ => self.provider.default_endpoint(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Store
    #[serde(rename = "store.path")]
    pub store_path: Option<String>,

    // Extraction
    #[serde(rename = "extract.validation")]
    pub validation: ValidationMode,

    #[serde(rename = "extract.placeholderTokens")]
    pub placeholder_tokens: Vec<String>,

    // Merge
    #[serde(rename = "merge.policy")]
    pub merge_policy: MergePolicy,

    // AI
    #[serde(rename = "ai", default)]
    pub ai: AISettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_path: None,
            validation: ValidationMode::Strict,
            placeholder_tokens: DEFAULT_PLACEHOLDER_TOKENS.iter().map(|s| s.to_string()).collect(),
            merge_policy: MergePolicy::FieldWise,
            ai: AISettings::default(),
        }
    }
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rekap");
        config_dir.join("settings.json")
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            let settings = Self::default();
            settings.create_default_file(path);
            return settings;
        }

        match fs::read_to_string(path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!("error parsing {}: {}; using default settings", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("error reading {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse settings JSON. Lines starting with // are comments.
    pub fn parse(contents: &str) -> Result<Self, String> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");

        serde_json::from_str(&cleaned).map_err(|e| e.to_string())
    }

    /// Store file path: settings value or the working-directory default.
    pub fn effective_store_path(&self) -> PathBuf {
        match self.store_path.as_deref() {
            Some(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => PathBuf::from(DEFAULT_STORE_FILE),
        }
    }

    /// Create default settings file with comments
    fn create_default_file(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                log::warn!("error creating config directory: {}", e);
                return;
            }
        }

        let default_config = r#"{
    // Store file (relative paths resolve against the working directory)
    "store.path": null,

    // Extraction: "strict" keeps records with a valid id,
    // "lenient" also keeps records that only carry a name
    "extract.validation": "strict",
    "extract.placeholderTokens": ["string", "number", "nomor"],

    // Merge: "field_wise" keeps stored values the update does not supply,
    // "replace" overwrites the whole row
    "merge.policy": "field_wise",

    // AI provider options: "none", "local" (Ollama), "openai"
    // API keys are stored in system keychain or REKAP_OPENAI_KEY, not in this file
    "ai": {
        "provider": "local",
        "model": "",
        "endpoint": null,
        "timeout_secs": 120
    }
}
"#;

        if let Err(e) = fs::write(path, default_config) {
            log::warn!("error writing default {}: {}", path.display(), e);
        }
    }
}
