//! OpenAI-compatible Chat Completions Provider

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::{info, warn};

use super::{LlmProvider, LlmResponse, TokenUsage, http_client};
use crate::ai::json::parse_model_json;
use crate::config::LlmConfig;
use crate::constants::llm::{DEFAULT_OPENAI_MODEL, DEFAULT_OPENAI_URL};
use crate::types::{ArchError, Result};

/// OpenAI API Provider with secure API key handling
pub struct OpenAiProvider {
    /// API key stored securely - never exposed in logs or debug output
    api_key: SecretString,
    api_base: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    client: reqwest::Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl OpenAiProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| {
                ArchError::Config(
                    "OpenAI API key not found. Set OPENAI_API_KEY or llm.api_key".to_string(),
                )
            })?;

        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string());
        url::Url::parse(&api_base)
            .map_err(|e| ArchError::Config(format!("Invalid API base '{}': {}", api_base, e)))?;

        Ok(Self {
            api_key: SecretString::from(api_key),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            client: http_client(config.timeout_secs)?,
        })
    }

    fn build_request(&self, prompt: &str, schema: &Value) -> ChatCompletionRequest {
        let system_content = if schema.is_null() {
            "You are a software architecture assistant. Always respond with valid JSON."
                .to_string()
        } else {
            let schema_str =
                serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
            format!(
                "You are a software architecture assistant. Always respond with valid JSON matching this schema:\n\n```json\n{}\n```\n\nRespond ONLY with valid JSON, no explanation.",
                schema_str
            )
        };

        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_content,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            response_format: Some(ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(&self, prompt: &str, schema: &Value) -> Result<LlmResponse> {
        info!(
            "Generating with OpenAI (model: {}, temperature: {})",
            self.model, self.temperature
        );

        let start_time = Instant::now();
        let request = self.build_request(prompt, schema);
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| ArchError::upstream("openai", format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ArchError::upstream(
                "openai",
                format!("API error ({}): {}", status, body),
            ));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ArchError::upstream("openai", format!("invalid response body: {}", e)))?;

        let usage = body
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        let content_str = body
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or_else(|| ArchError::upstream("openai", "no content in response"))?;

        Ok(LlmResponse {
            content: parse_model_json(content_str)?,
            usage,
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.api_base);

        let response = self
            .client
            .get(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => Ok(true),
            Ok(resp) => {
                warn!("OpenAI API check failed: {}", resp.status());
                Ok(false)
            }
            Err(e) => {
                warn!("OpenAI API check failed: {}", e);
                Ok(false)
            }
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageInfo {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LlmConfig {
        LlmConfig {
            provider: "openai".to_string(),
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_debug_redacts_key() {
        let provider = OpenAiProvider::new(&config()).unwrap();
        let debug = format!("{:?}", provider);
        assert!(!debug.contains("sk-test"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_request_embeds_schema() {
        let provider = OpenAiProvider::new(&config()).unwrap();
        let request = provider.build_request("q", &serde_json::json!({"type": "object"}));
        assert_eq!(request.messages.len(), 2);
        assert!(request.messages[0].content.contains("\"object\""));
        assert_eq!(request.messages[1].content, "q");
    }
}
