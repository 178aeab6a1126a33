//! Ollama Local LLM Provider
//!
//! LLM provider for locally-running Ollama models via `/api/generate`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{LlmProvider, LlmResponse, TokenUsage, http_client, prompt_utils};
use crate::ai::json::parse_model_json;
use crate::config::LlmConfig;
use crate::constants::llm::{DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL};
use crate::types::{ArchError, Result};

/// Ollama Local LLM Provider
pub struct OllamaProvider {
    api_base: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_base = config.api_base.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);

        // Validate endpoint URL for security (SSRF prevention)
        let api_base = Self::validate_endpoint(api_base)?;

        let model = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string());

        Ok(Self {
            api_base,
            model,
            temperature: config.temperature,
            client: http_client(config.timeout_secs)?,
        })
    }

    /// Only allows http/https schemes and warns for non-localhost endpoints.
    fn validate_endpoint(endpoint: &str) -> Result<String> {
        let url = url::Url::parse(endpoint).map_err(|e| {
            ArchError::Config(format!("Invalid Ollama endpoint URL '{}': {}", endpoint, e))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ArchError::Config(format!(
                "Ollama endpoint must use http or https scheme, got: {}",
                url.scheme()
            )));
        }

        if let Some(host) = url.host_str()
            && !matches!(host, "localhost" | "127.0.0.1" | "[::1]")
        {
            warn!(
                "Ollama endpoint is not localhost: {}. Ensure this is intentional.",
                host
            );
        }

        let mut result = url.to_string();
        if result.ends_with('/') {
            result.pop();
        }
        Ok(result)
    }

    fn build_request(&self, prompt: &str, schema: &Value) -> OllamaRequest {
        OllamaRequest {
            model: self.model.clone(),
            prompt: prompt_utils::build_schema_prompt(prompt, schema),
            stream: false,
            options: Some(OllamaOptions {
                temperature: self.temperature,
            }),
            format: Some("json".to_string()),
        }
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(&self, prompt: &str, schema: &Value) -> Result<LlmResponse> {
        info!(
            "Generating with Ollama (model: {}, temperature: {})",
            self.model, self.temperature
        );

        let start_time = Instant::now();
        let request = self.build_request(prompt, schema);
        let url = format!("{}/api/generate", self.api_base);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ArchError::upstream(
                        "ollama",
                        format!(
                            "cannot connect to {}. Is Ollama running? Start with: ollama serve",
                            self.api_base
                        ),
                    )
                } else if e.is_timeout() {
                    ArchError::upstream("ollama", "request timed out")
                } else {
                    ArchError::upstream("ollama", format!("request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ArchError::upstream(
                "ollama",
                format!("API error ({}): {}", status, body),
            ));
        }

        let body: OllamaResponse = response
            .json()
            .await
            .map_err(|e| ArchError::upstream("ollama", format!("invalid response body: {}", e)))?;

        debug!("Received response from Ollama, parsing JSON");
        let content = parse_model_json(&body.response)?;

        Ok(LlmResponse {
            content,
            usage: TokenUsage {
                input_tokens: body.prompt_eval_count.unwrap_or(0),
                output_tokens: body.eval_count.unwrap_or(0),
            },
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.api_base);

        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let Ok(tags) = resp.json::<OllamaTagsResponse>().await else {
                    return Ok(true);
                };
                let base = self.model.trim_end_matches(":latest");
                let available = tags
                    .models
                    .iter()
                    .any(|m| m.name == self.model || m.name.starts_with(base));
                if !available {
                    warn!(
                        "Ollama is running but model '{}' not found. Pull with: ollama pull {}",
                        self.model, self.model
                    );
                }
                Ok(available)
            }
            Ok(resp) => {
                warn!("Ollama API check failed: {}", resp.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Ollama not available: {}", e);
                Ok(false)
            }
        }
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LlmConfig {
        LlmConfig {
            provider: "ollama".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_match_local_ollama() {
        let provider = OllamaProvider::new(&config()).unwrap();
        assert_eq!(provider.api_base, "http://localhost:11434");
        assert_eq!(provider.model, "llama2");
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        let mut config = config();
        config.api_base = Some("file:///etc/passwd".to_string());
        assert!(OllamaProvider::new(&config).is_err());
    }

    #[test]
    fn test_request_asks_for_json() {
        let provider = OllamaProvider::new(&config()).unwrap();
        let request = provider.build_request("hi", &serde_json::json!({"type": "object"}));
        assert_eq!(request.format.as_deref(), Some("json"));
        assert!(!request.stream);
        assert!(request.prompt.starts_with("hi"));
    }
}
