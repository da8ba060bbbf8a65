use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::{
    build_client, error_body, normalize_base_url, BackendError, BackendSettings, Completion,
    TextBackend,
};
use crate::error::Result;

const PROVIDER: &str = "ollama";

/// Ollama API request structure for chat completions
#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama API response structure
#[derive(Deserialize)]
struct OllamaResponse {
    message: Option<OllamaResponseMessage>,
}

#[derive(Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

/// Client for a local Ollama server (`/api/chat`, non-streaming).
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaBackend {
    pub fn new(settings: BackendSettings) -> Result<Self> {
        Ok(Self {
            client: build_client(settings.timeout)?,
            base_url: normalize_base_url(&settings.base_url)?,
            model: settings.model,
            temperature: settings.temperature,
        })
    }
}

pub(crate) fn decode_ollama_response(body: &str) -> std::result::Result<Completion, BackendError> {
    let parsed: OllamaResponse = serde_json::from_str(body).map_err(|e| {
        BackendError::malformed(PROVIDER, format!("Failed to parse response: {}", e))
    })?;
    parsed
        .message
        .map(|m| Completion { text: m.content })
        .ok_or_else(|| BackendError::malformed(PROVIDER, "response had no message"))
}

#[async_trait]
impl TextBackend for OllamaBackend {
    async fn complete(&self, prompt: &str) -> std::result::Result<Completion, BackendError> {
        let start = Instant::now();
        let request = OllamaRequest {
            model: &self.model,
            messages: vec![OllamaMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| BackendError::from_transport(PROVIDER, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(BackendError::from_status(PROVIDER, status, &body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| BackendError::from_transport(PROVIDER, &e))?;
        let completion = decode_ollama_response(&body)?;

        log::debug!("Ollama chat ({}) took {:?}", self.model, start.elapsed());
        Ok(completion)
    }

    fn provider_name(&self) -> &str {
        PROVIDER
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
