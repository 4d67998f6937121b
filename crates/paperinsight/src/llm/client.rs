//! Client for the external generative-text service.
//!
//! Speaks the OpenAI-style chat-completions protocol and requests
//! JSON-formatted output. The API key is an explicit constructor input;
//! there is no process-global configuration.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Failure modes of the analysis service, surfaced distinctly so the
/// worker can decide whether an attempt is worth retrying.
#[derive(Error, Debug)]
pub enum LlmError {
    /// HTTP 429 — back off and retry.
    #[error("Analysis service rate limited the request")]
    RateLimited,

    /// The request exceeded the configured timeout. Retryable.
    #[error("Analysis service request timed out")]
    Timeout,

    /// HTTP 401/403 — configuration problem, never retryable.
    #[error("Authentication with analysis service failed: {0}")]
    Auth(String),

    /// Connection failures and server-side errors. Retryable.
    #[error("Analysis service unavailable: {0}")]
    Unavailable(String),

    /// A response arrived but did not have the expected shape.
    /// Retryable, since model output is non-deterministic.
    #[error("Invalid response from analysis service: {0}")]
    InvalidResponse(String),
}

fn default_endpoint() -> String {
    "https://api.openai.com".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_timeout_secs() -> u64 {
    120
}

/// Configuration for the analysis service client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the chat-completions endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// API key. Empty means "take it from the environment" at load time.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-request timeout. The model call is the dominant latency
    /// source of the whole pipeline, so it must be bounded.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: String::new(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Seam between the pipeline and the external service, so tests can
/// substitute a scripted fake.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Sends the prompt and returns the raw response text, which is
    /// expected (but not guaranteed) to parse as a JSON object.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

pub struct LlmClient {
    config: LlmConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}

impl LlmClient {
    /// Creates a new client with the given configuration.
    pub fn new(config: LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl AnalysisClient for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
        };

        debug!("Sending {} prompt chars to {}", prompt.len(), self.config.model);

        let resp = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Unavailable(e.to_string())
                }
            })?;

        match resp.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(LlmError::RateLimited),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let body = resp.text().await.unwrap_or_default();
                return Err(LlmError::Auth(body));
            }
            status if !status.is_success() => {
                let body = resp.text().await.unwrap_or_default();
                return Err(LlmError::Unavailable(format!("HTTP {}: {}", status, body)));
            }
            _ => {}
        }

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let choice = chat
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("response carried no choices".to_string()))?;

        Ok(choice.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_url_normalizes_trailing_slash() {
        let client = LlmClient::new(LlmConfig {
            endpoint: "http://localhost:8080/".to_string(),
            ..LlmConfig::default()
        });
        assert_eq!(
            client.completions_url(),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_serializes_json_response_format() {
        let request = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "hi".to_string(),
            }],
            temperature: 0.2,
            max_tokens: 16,
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_default_config() {
        let config = LlmConfig::default();
        assert!(config.api_key.is_empty());
        assert!(config.model.contains("mini"));
        assert_eq!(config.timeout_secs, 120);
    }
}
