//! Text-generation backends.
//!
//! Every provider is adapted to [`TextBackend`]; provider-specific response
//! shapes are decoded inside the adapter into a [`Completion`] or a
//! [`BackendError`], so callers never branch on the provider.

pub mod chain;
pub mod ollama;
pub mod openai;

pub use chain::{connect, create_backend, fallback_order, first_available, BackendConstructor};
pub use ollama::OllamaBackend;
pub use openai::OpenAiCompatibleBackend;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::error::{KgError, Result};

/// Supported text-generation providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Free hosted API (Hugging Face router, OpenAI-compatible)
    HuggingFace,
    /// Local Ollama server
    Ollama,
    /// Paid hosted API
    OpenAi,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [
        BackendKind::HuggingFace,
        BackendKind::Ollama,
        BackendKind::OpenAi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::HuggingFace => "huggingface",
            BackendKind::Ollama => "ollama",
            BackendKind::OpenAi => "openai",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            BackendKind::HuggingFace => "https://router.huggingface.co/v1",
            BackendKind::Ollama => "http://localhost:11434",
            BackendKind::OpenAi => "https://api.openai.com/v1",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            BackendKind::HuggingFace => "meta-llama/Llama-3.1-8B-Instruct",
            BackendKind::Ollama => "qwen3:1.7b",
            BackendKind::OpenAi => "gpt-4o-mini",
        }
    }

    /// Environment variable holding the API key, if the provider needs one.
    pub fn default_api_key_env(&self) -> Option<&'static str> {
        match self {
            BackendKind::HuggingFace => Some("HF_TOKEN"),
            BackendKind::Ollama => None,
            BackendKind::OpenAi => Some("OPENAI_API_KEY"),
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, BackendKind::Ollama)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = KgError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "huggingface" | "hf" => Ok(BackendKind::HuggingFace),
            "ollama" => Ok(BackendKind::Ollama),
            "openai" => Ok(BackendKind::OpenAi),
            other => Err(KgError::InvalidInput(format!(
                "Unsupported LLM provider: {}. Available providers: huggingface, ollama, openai",
                other
            ))),
        }
    }
}

/// Resolved settings for constructing one backend.
#[derive(Clone)]
pub struct BackendSettings {
    pub kind: BackendKind,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Name of the variable `api_key` was read from, for error messages
    pub api_key_env: Option<String>,
    pub temperature: f32,
    pub timeout: Duration,
}

impl BackendSettings {
    /// Settings with the provider defaults and no API key.
    pub fn defaults(kind: BackendKind) -> Self {
        Self {
            kind,
            base_url: kind.default_base_url().to_string(),
            model: kind.default_model().to_string(),
            api_key: None,
            api_key_env: kind.default_api_key_env().map(String::from),
            temperature: 0.0,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Generated text, decoded from whatever shape the provider returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
}

/// Failure category of a backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
    /// Connection failure or timeout
    Network,
    /// Rejected credentials (401/403)
    Auth,
    /// Rate limit or exhausted quota (402/429)
    Quota,
    /// Any other non-success HTTP status
    Status,
    /// Body could not be decoded into a completion
    MalformedResponse,
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BackendErrorKind::Network => "network error",
            BackendErrorKind::Auth => "authentication failed",
            BackendErrorKind::Quota => "quota exceeded",
            BackendErrorKind::Status => "unexpected status",
            BackendErrorKind::MalformedResponse => "malformed response",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind} from {provider}: {message}")]
pub struct BackendError {
    pub kind: BackendErrorKind,
    pub provider: String,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, provider: &str, message: impl Into<String>) -> Self {
        Self {
            kind,
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP response.
    pub fn from_status(provider: &str, status: StatusCode, body: &str) -> Self {
        let kind = match status.as_u16() {
            401 | 403 => BackendErrorKind::Auth,
            402 | 429 => BackendErrorKind::Quota,
            _ => BackendErrorKind::Status,
        };
        Self::new(kind, provider, format!("HTTP {}: {}", status, body.trim()))
    }

    pub fn from_transport(provider: &str, err: &reqwest::Error) -> Self {
        Self::new(BackendErrorKind::Network, provider, err.to_string())
    }

    pub fn malformed(provider: &str, message: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::MalformedResponse, provider, message)
    }
}

/// Main trait for text-generation providers
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Send one prompt and return the generated text
    async fn complete(&self, prompt: &str) -> std::result::Result<Completion, BackendError>;

    /// Provider identifier, e.g. `ollama`
    fn provider_name(&self) -> &str;

    /// Model identifier
    fn model_name(&self) -> &str;
}

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Validate a base URL and strip any trailing slash so paths can be appended.
pub(crate) fn normalize_base_url(raw: &str) -> Result<String> {
    url::Url::parse(raw)
        .map_err(|e| KgError::Config(format!("Invalid base URL '{}': {}", raw, e)))?;
    Ok(raw.trim_end_matches('/').to_string())
}

/// Read the error body of a failed response without failing again.
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string())
}
