use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::{
    build_client, error_body, normalize_base_url, BackendError, BackendSettings, Completion,
    TextBackend,
};
use crate::error::{KgError, Result};

/// Request structure for the chat completions API
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Response structure from the chat completions API
#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Client for OpenAI-compatible chat completion endpoints.
///
/// Serves both the paid OpenAI API and the free Hugging Face router, which
/// speaks the same protocol.
pub struct OpenAiCompatibleBackend {
    client: Client,
    provider: String,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl OpenAiCompatibleBackend {
    /// Create a new client. Fails when the provider needs an API key and none
    /// was resolved, or when the base URL does not parse.
    pub fn new(settings: BackendSettings) -> Result<Self> {
        let api_key = settings.api_key.filter(|k| !k.trim().is_empty());
        if settings.kind.requires_api_key() && api_key.is_none() {
            return Err(KgError::Config(format!(
                "Environment variable {} not set. Set it in your .env file or as an \
                 environment variable with your {} API key.",
                settings.api_key_env.as_deref().unwrap_or("<unset>"),
                settings.kind
            )));
        }

        Ok(Self {
            client: build_client(settings.timeout)?,
            provider: settings.kind.to_string(),
            base_url: normalize_base_url(&settings.base_url)?,
            model: settings.model,
            api_key,
            temperature: settings.temperature,
        })
    }

    fn decode(&self, body: &str) -> std::result::Result<Completion, BackendError> {
        decode_chat_response(&self.provider, body)
    }
}

/// Decode `choices[0].message.content` from a chat completions body.
pub(crate) fn decode_chat_response(
    provider: &str,
    body: &str,
) -> std::result::Result<Completion, BackendError> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| {
        BackendError::malformed(provider, format!("Failed to parse response: {}", e))
    })?;

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| BackendError::malformed(provider, "response contained no choices"))?;

    choice
        .message
        .content
        .map(|text| Completion { text })
        .ok_or_else(|| BackendError::malformed(provider, "response message had no content"))
}

#[async_trait]
impl TextBackend for OpenAiCompatibleBackend {
    async fn complete(&self, prompt: &str) -> std::result::Result<Completion, BackendError> {
        let start = Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| BackendError::from_transport(&self.provider, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(BackendError::from_status(&self.provider, status, &body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| BackendError::from_transport(&self.provider, &e))?;
        let completion = self.decode(&body)?;

        log::debug!(
            "{} chat completion ({}) took {:?}",
            self.provider,
            self.model,
            start.elapsed()
        );
        Ok(completion)
    }

    fn provider_name(&self) -> &str {
        &self.provider
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{BackendErrorKind, BackendKind};
    use axum::{http::StatusCode, routing::post, Json, Router};

    async fn spawn_mock(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn spawn_canned(status: StatusCode, body: &'static str) -> String {
        let app = Router::new().route(
            "/chat/completions",
            post(move || async move { (status, body) }),
        );
        spawn_mock(app).await
    }

    fn settings(base_url: String) -> BackendSettings {
        BackendSettings {
            base_url,
            api_key: Some("test-key".to_string()),
            temperature: 0.5,
            ..BackendSettings::defaults(BackendKind::OpenAi)
        }
    }

    #[test]
    fn test_new_requires_api_key() {
        let result = OpenAiCompatibleBackend::new(BackendSettings::defaults(BackendKind::OpenAi));
        let err = result.err().expect("missing key must fail");
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_new_rejects_blank_api_key() {
        let settings = BackendSettings {
            api_key: Some("   ".to_string()),
            ..BackendSettings::defaults(BackendKind::HuggingFace)
        };
        assert!(OpenAiCompatibleBackend::new(settings).is_err());
    }

    #[test]
    fn test_new_rejects_bad_url() {
        let result = OpenAiCompatibleBackend::new(settings("::nope::".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_chat_response() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Buy later."}}]}"#;
        let completion = decode_chat_response("openai", body).unwrap();
        assert_eq!(completion.text, "Buy later.");
    }

    #[test]
    fn test_decode_rejects_empty_choices_and_null_content() {
        let err = decode_chat_response("openai", r#"{"choices":[]}"#).unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::MalformedResponse);

        let err = decode_chat_response("openai", r#"{"choices":[{"message":{"content":null}}]}"#)
            .unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::MalformedResponse);

        let err = decode_chat_response("openai", "<html>").unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn test_complete_sends_model_and_temperature() {
        let app = Router::new().route(
            "/chat/completions",
            post(|Json(req): Json<serde_json::Value>| async move {
                let content = format!(
                    "{}|{}|{}",
                    req["model"].as_str().unwrap_or_default(),
                    req["temperature"],
                    req["messages"][0]["content"].as_str().unwrap_or_default()
                );
                Json(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": content}}]
                }))
            }),
        );
        let base_url = spawn_mock(app).await;
        let backend = OpenAiCompatibleBackend::new(settings(base_url)).unwrap();

        let completion = backend.complete("hello").await.unwrap();
        assert_eq!(completion.text, "gpt-4o-mini|0.5|hello");
    }

    #[tokio::test]
    async fn test_complete_maps_auth_failure() {
        let base_url = spawn_canned(StatusCode::UNAUTHORIZED, "invalid api key").await;
        let backend = OpenAiCompatibleBackend::new(settings(base_url)).unwrap();

        let err = backend.complete("hello").await.unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::Auth);
        assert!(err.message.contains("invalid api key"));
    }

    #[tokio::test]
    async fn test_complete_maps_quota_failure() {
        let base_url = spawn_canned(StatusCode::TOO_MANY_REQUESTS, "rate limited").await;
        let backend = OpenAiCompatibleBackend::new(settings(base_url)).unwrap();

        let err = backend.complete("hello").await.unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::Quota);
    }

    #[tokio::test]
    async fn test_complete_maps_malformed_body() {
        let base_url = spawn_canned(StatusCode::OK, "{\"unexpected\": true}").await;
        let backend = OpenAiCompatibleBackend::new(settings(base_url)).unwrap();

        let err = backend.complete("hello").await.unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn test_complete_maps_connection_failure() {
        // Bind then drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let backend = OpenAiCompatibleBackend::new(settings(format!("http://{}", addr))).unwrap();
        let err = backend.complete("hello").await.unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::Network);
    }
}
