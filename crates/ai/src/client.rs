// Oracle clients for record extraction
//
// One blocking call per extraction, JSON mode requested, no retries.
// Supports a local Ollama server and the OpenAI chat completions API.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use rekap_config::ai::{AIConfigStatus, ResolvedAIConfig};
use rekap_config::AIProvider;

/// One request to the text-generation backend.
#[derive(Debug, Clone, Copy)]
pub struct OracleRequest<'a> {
    /// Fixed instruction ("system" role)
    pub system: &'a str,
    /// The user's raw text
    pub user: &'a str,
    /// Ask the backend to constrain output to JSON
    pub json_mode: bool,
}

/// Error from the oracle call itself (not from parsing its answer)
#[derive(Debug, Clone)]
pub enum OracleError {
    /// Provider disabled or unusable
    NotConfigured(String),
    /// API key missing
    MissingKey,
    /// Call exceeded the configured timeout
    Timeout(Duration),
    /// Network error
    NetworkError(String),
    /// API error response
    ApiError { status: u16, message: String },
    /// Provider returned an envelope we cannot read
    InvalidResponse(String),
}

impl std::fmt::Display for OracleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleError::NotConfigured(msg) => write!(f, "AI not configured: {}", msg),
            OracleError::MissingKey => write!(f, "API key not configured"),
            OracleError::Timeout(after) => write!(f, "model did not answer within {}s", after.as_secs()),
            OracleError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            OracleError::ApiError { status, message } => write!(f, "API error ({}): {}", status, message),
            OracleError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),
        }
    }
}

impl std::error::Error for OracleError {}

/// A text-generation backend, treated as a black box returning raw text.
pub trait Oracle {
    fn complete(&self, request: &OracleRequest<'_>) -> Result<String, OracleError>;

    /// Short label for logs, e.g. "local/llama3.2"
    fn label(&self) -> String;
}

impl<T: Oracle + ?Sized> Oracle for Box<T> {
    fn complete(&self, request: &OracleRequest<'_>) -> Result<String, OracleError> {
        (**self).complete(request)
    }

    fn label(&self) -> String {
        (**self).label()
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::blocking::Client, OracleError> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| OracleError::NetworkError(e.to_string()))
}

fn send_error(e: reqwest::Error, timeout: Duration) -> OracleError {
    if e.is_timeout() {
        OracleError::Timeout(timeout)
    } else {
        OracleError::NetworkError(e.to_string())
    }
}

// ============================================================================
// Ollama
// ============================================================================

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: Option<OllamaMessage>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: String,
}

#[derive(Deserialize)]
struct OllamaError {
    error: String,
}

/// Local model served by Ollama (`POST /api/chat`).
pub struct OllamaOracle {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaOracle {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self, OracleError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout,
        })
    }
}

impl Oracle for OllamaOracle {
    fn complete(&self, request: &OracleRequest<'_>) -> Result<String, OracleError> {
        let body = OllamaRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: request.system },
                ChatMessage { role: "user", content: request.user },
            ],
            stream: false,
            format: request.json_mode.then_some("json"),
            options: OllamaOptions { temperature: 0.0 },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .map_err(|e| send_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().unwrap_or_default();
            let message = serde_json::from_str::<OllamaError>(&error_text)
                .map(|e| e.error)
                .unwrap_or(error_text);
            return Err(OracleError::ApiError { status: status.as_u16(), message });
        }

        let body: OllamaResponse = response
            .json()
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        body.message
            .map(|m| m.content)
            .ok_or_else(|| OracleError::InvalidResponse("No message in response".to_string()))
    }

    fn label(&self) -> String {
        format!("local/{}", self.model)
    }
}

// ============================================================================
// OpenAI
// ============================================================================

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAIResponseFormat>,
}

#[derive(Serialize)]
struct OpenAIResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIError {
    error: OpenAIErrorDetail,
}

#[derive(Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}

/// OpenAI chat completions (`POST /v1/chat/completions`).
pub struct OpenAIOracle {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAIOracle {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            timeout,
        })
    }
}

impl Oracle for OpenAIOracle {
    fn complete(&self, request: &OracleRequest<'_>) -> Result<String, OracleError> {
        let body = OpenAIRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: request.system },
                ChatMessage { role: "user", content: request.user },
            ],
            temperature: 0.0,
            response_format: request
                .json_mode
                .then_some(OpenAIResponseFormat { format_type: "json_object" }),
        };

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .map_err(|e| send_error(e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().unwrap_or_default();
            let message = serde_json::from_str::<OpenAIError>(&error_text)
                .map(|e| e.error.message)
                .unwrap_or(error_text);
            return Err(OracleError::ApiError { status: status.as_u16(), message });
        }

        let body: OpenAIResponse = response
            .json()
            .map_err(|e| OracleError::InvalidResponse(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OracleError::InvalidResponse("No choices in response".to_string()))
    }

    fn label(&self) -> String {
        format!("openai/{}", self.model)
    }
}

// ============================================================================
// Construction from config
// ============================================================================

/// Build the oracle selected by the resolved configuration.
pub fn oracle_from_config(config: &ResolvedAIConfig) -> Result<Box<dyn Oracle>, OracleError> {
    match config.status {
        AIConfigStatus::Disabled => {
            return Err(OracleError::NotConfigured("AI is disabled (provider=none)".to_string()));
        }
        AIConfigStatus::MissingKey => return Err(OracleError::MissingKey),
        AIConfigStatus::Ready => {}
    }

    match config.provider {
        AIProvider::None => Err(OracleError::NotConfigured("AI is disabled (provider=none)".to_string())),
        AIProvider::Local => Ok(Box::new(OllamaOracle::new(
            config.endpoint.clone(),
            config.model.clone(),
            config.timeout,
        )?)),
        AIProvider::OpenAI => {
            let api_key = config.api_key.clone().ok_or(OracleError::MissingKey)?;
            Ok(Box::new(OpenAIOracle::new(
                config.endpoint.clone(),
                api_key,
                config.model.clone(),
                config.timeout,
            )?))
        }
    }
}

/// Connectivity check for `ai doctor --test`. Makes a cheap listing call,
/// never an extraction.
pub fn check_reachable(config: &ResolvedAIConfig) -> Result<String, OracleError> {
    let client = http_client(config.timeout.min(Duration::from_secs(5)))?;
    let request = match config.provider {
        AIProvider::None => {
            return Err(OracleError::NotConfigured("AI is disabled (provider=none)".to_string()));
        }
        AIProvider::Local => client.get(format!("{}/api/tags", config.endpoint)),
        AIProvider::OpenAI => {
            let api_key = config.api_key.as_deref().ok_or(OracleError::MissingKey)?;
            client
                .get(format!("{}/v1/models", config.endpoint))
                .header("Authorization", format!("Bearer {}", api_key))
        }
    };

    let response = request
        .send()
        .map_err(|e| OracleError::NetworkError(e.to_string()))?;
    let status = response.status();
    if status.is_success() {
        Ok(format!("{} reachable at {}", config.provider.name(), config.endpoint))
    } else {
        Err(OracleError::ApiError {
            status: status.as_u16(),
            message: response.text().unwrap_or_default(),
        })
    }
}
