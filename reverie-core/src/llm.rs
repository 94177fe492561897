//! Chat-completion client for OpenRouter-compatible endpoints.
//!
//! Provides a `CompletionBackend` trait that agents depend on, and
//! `OpenRouterClient` which issues exactly one JSON-mode request per call.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_MAX_TOKENS: u32 = 500;

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Missing API key")]
    MissingApiKey,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenRouter API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("No content in OpenRouter response")]
    EmptyResponse,

    #[error("Failed to parse JSON response: {raw}")]
    MalformedResponse { raw: String },
}

// ============================================================================
// Config types
// ============================================================================

#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_seconds: u64,
    pub referer: String,
    pub title: String,
}

impl LlmClientConfig {
    pub fn from_settings(settings: &crate::config::LlmConfig, api_key: String) -> Self {
        Self {
            api_key,
            base_url: settings.base_url.clone(),
            timeout_seconds: settings.timeout_seconds,
            referer: settings.referer.clone(),
            title: settings.title.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallOptions {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl CallOptions {
    pub fn max_tokens(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            ..Self::default()
        }
    }
}

/// Parsed model output plus accounting. `data` is not schema-checked.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmResponse {
    pub data: Value,
    pub tokens_used: i32,
    pub model: String,
}

// ============================================================================
// CompletionBackend trait
// ============================================================================

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete_json(
        &self,
        prompt: &str,
        model: &str,
        system_prompt: Option<&str>,
        options: CallOptions,
    ) -> Result<LlmResponse, LlmError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Wire structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: i32,
    #[serde(default)]
    completion_tokens: i32,
}

// ============================================================================
// OpenRouterClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    client: Client,
    config: LlmClientConfig,
}

impl OpenRouterClient {
    pub fn new(config: LlmClientConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl CompletionBackend for OpenRouterClient {
    async fn complete_json(
        &self,
        prompt: &str,
        model: &str,
        system_prompt: Option<&str>,
        options: CallOptions,
    ) -> Result<LlmResponse, LlmError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let request = ChatRequest {
            model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .header("HTTP-Referer", &self.config.referer)
            .header("X-Title", &self.config.title)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, model, "OpenRouter API error");
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response.json().await?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        let data: Value = serde_json::from_str(&content).map_err(|e| {
            tracing::error!(error = %e, model, "Model returned non-JSON content");
            LlmError::MalformedResponse { raw: content.clone() }
        })?;

        let tokens_used = chat
            .usage
            .map(|u| u.prompt_tokens.saturating_add(u.completion_tokens))
            .unwrap_or(0);

        tracing::debug!(model, tokens_used, "Completion received");

        Ok(LlmResponse {
            data,
            tokens_used,
            model: model.to_string(),
        })
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(api_key: &str, base_url: String) -> LlmClientConfig {
        LlmClientConfig {
            api_key: api_key.to_string(),
            base_url,
            timeout_seconds: 5,
            referer: "https://reverie.test".to_string(),
            title: "Reverie Test".to_string(),
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }],
            "usage": { "prompt_tokens": 40, "completion_tokens": 12 }
        })
    }

    #[tokio::test]
    async fn test_complete_json_sends_headers_and_parses_content() {
        let mock_server = MockServer::start().await;
        let client = OpenRouterClient::new(test_config("test-key", mock_server.uri()))
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(header("HTTP-Referer", "https://reverie.test"))
            .and(header("X-Title", "Reverie Test"))
            .and(body_partial_json(serde_json::json!({
                "model": "openai/gpt-4o-mini",
                "max_tokens": 500,
                "response_format": { "type": "json_object" },
                "messages": [
                    { "role": "system", "content": "be terse" },
                    { "role": "user", "content": "hello" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(r#"{"ok": true}"#)))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = client
            .complete_json("hello", "openai/gpt-4o-mini", Some("be terse"), CallOptions::default())
            .await
            .expect("Expected Ok");

        assert_eq!(result.data, serde_json::json!({ "ok": true }));
        assert_eq!(result.tokens_used, 52);
        assert_eq!(result.model, "openai/gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_missing_usage_counts_zero_tokens() {
        let mock_server = MockServer::start().await;
        let client = OpenRouterClient::new(test_config("k", mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "content": "{}" } }]
            })))
            .mount(&mock_server)
            .await;

        let result = client
            .complete_json("p", "m", None, CallOptions::max_tokens(100))
            .await
            .unwrap();
        assert_eq!(result.tokens_used, 0);
    }

    #[tokio::test]
    async fn test_huge_usage_saturates() {
        let mock_server = MockServer::start().await;
        let client = OpenRouterClient::new(test_config("k", mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "content": "{}" } }],
                "usage": { "prompt_tokens": 2_000_000_000, "completion_tokens": 2_000_000_000 }
            })))
            .mount(&mock_server)
            .await;

        let result = client
            .complete_json("p", "m", None, CallOptions::default())
            .await
            .unwrap();
        assert_eq!(result.tokens_used, i32::MAX);
    }

    #[tokio::test]
    async fn test_non_success_status_is_api_error() {
        let mock_server = MockServer::start().await;
        let client = OpenRouterClient::new(test_config("k", mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .expect(1)
            .mount(&mock_server)
            .await;

        match client.complete_json("p", "m", None, CallOptions::default()).await {
            Err(LlmError::Api { status, body }) => {
                assert_eq!(status, 429);
                assert_eq!(body, "rate limited");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_choices_is_empty_response() {
        let mock_server = MockServer::start().await;
        let client = OpenRouterClient::new(test_config("k", mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })))
            .mount(&mock_server)
            .await;

        let result = client.complete_json("p", "m", None, CallOptions::default()).await;
        assert!(matches!(result, Err(LlmError::EmptyResponse)));
    }

    #[tokio::test]
    async fn test_non_json_content_is_malformed() {
        let mock_server = MockServer::start().await;
        let client = OpenRouterClient::new(test_config("k", mock_server.uri())).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("not json at all")))
            .mount(&mock_server)
            .await;

        match client.complete_json("p", "m", None, CallOptions::default()).await {
            Err(LlmError::MalformedResponse { raw }) => assert_eq!(raw, "not json at all"),
            other => panic!("Expected MalformedResponse, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_api_key_is_rejected() {
        let result = OpenRouterClient::new(test_config("", "http://localhost".to_string()));
        assert!(matches!(result, Err(LlmError::MissingApiKey)));
    }
}
