use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use std::time::{Duration, Instant};

use super::ImageBackend;
use crate::config::ImagesConfig;
use crate::error::{KgError, Result};
use crate::llm::{build_client, error_body, normalize_base_url};

/// Request structure for the hosted text-to-image endpoint
#[derive(Serialize)]
struct TextToImageRequest<'a> {
    inputs: &'a str,
    parameters: TextToImageParameters,
}

#[derive(Serialize)]
struct TextToImageParameters {
    num_inference_steps: u32,
    guidance_scale: f32,
}

/// Client for a diffusion model served by the Hugging Face inference API.
pub struct HfImageBackend {
    client: Client,
    endpoint: String,
    model_id: String,
    api_key: Option<String>,
}

impl HfImageBackend {
    pub fn new(
        base_url: &str,
        model_id: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: format!("{}/{}", normalize_base_url(base_url)?, model_id),
            model_id: model_id.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Build from config. The token is optional: open models accept
    /// anonymous requests.
    pub fn from_config(config: &ImagesConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            log::debug!(
                "{} not set, sending anonymous image requests",
                config.api_key_env
            );
        }
        Self::new(
            &config.base_url,
            &config.model_id,
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl ImageBackend for HfImageBackend {
    async fn generate(&self, prompt: &str, steps: u32, guidance_scale: f32) -> Result<Vec<u8>> {
        let start = Instant::now();
        let request = TextToImageRequest {
            inputs: prompt,
            parameters: TextToImageParameters {
                num_inference_steps: steps,
                guidance_scale,
            },
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| KgError::Image(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(KgError::Image(format!("{} returned {}: {}", self.model_id, status, body)));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("image/") {
            let body = error_body(response).await;
            return Err(KgError::Image(format!(
                "expected an image, got '{}': {}",
                content_type, body
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| KgError::Image(format!("Failed to read image: {}", e)))?;

        log::debug!(
            "Generated image with {} ({} bytes) in {:?}",
            self.model_id,
            bytes.len(),
            start.elapsed()
        );
        Ok(bytes.to_vec())
    }
}
