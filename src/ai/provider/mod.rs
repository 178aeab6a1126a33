//! LLM Provider Abstraction
//!
//! Defines the LlmProvider trait for structured LLM output generation.
//! Every provider returns JSON content; failures surface as upstream errors.

mod ollama;
mod openai;
pub(crate) mod prompt_utils;

pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::types::{ArchError, Result};

// =============================================================================
// LLM Response
// =============================================================================

/// LLM response: structured content plus usage
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Generated content (structured JSON)
    pub content: Value,
    /// Token usage metrics
    pub usage: TokenUsage,
    /// Wall-clock duration in milliseconds
    pub elapsed_ms: u64,
}

impl LlmResponse {
    /// Create response with content only (usage unknown)
    pub fn content_only(content: Value) -> Self {
        Self {
            content,
            usage: TokenUsage::default(),
            elapsed_ms: 0,
        }
    }
}

/// Token usage metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Input tokens (prompt)
    pub input_tokens: u32,
    /// Output tokens (response)
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Total tokens used (input + output)
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Shared LLM provider type for concurrent access across agents.
pub type SharedProvider = Arc<dyn LlmProvider + Send + Sync>;

// =============================================================================
// LLM Provider Trait
// =============================================================================

/// LLM Provider trait for structured output generation
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate structured output guided by a JSON Schema
    async fn generate(&self, prompt: &str, schema: &Value) -> Result<LlmResponse>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model name currently in use
    fn model(&self) -> &str;

    /// Check if the provider is available
    async fn health_check(&self) -> Result<bool>;
}

/// Create a shared provider from configuration; `None` for the rule-based mode
pub fn create_provider(config: &LlmConfig) -> Result<Option<SharedProvider>> {
    match config.provider.as_str() {
        "rule" => Ok(None),
        "openai" => Ok(Some(Arc::new(OpenAiProvider::new(config)?))),
        "ollama" => Ok(Some(Arc::new(OllamaProvider::new(config)?))),
        other => Err(ArchError::Config(format!(
            "Unknown provider: {}. Supported: rule, ollama, openai",
            other
        ))),
    }
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .connect_timeout(std::time::Duration::from_secs(
            crate::constants::network::CONNECTION_TIMEOUT_SECS,
        ))
        .build()
        .map_err(|e| ArchError::Config(format!("Failed to create HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_provider_has_no_model() {
        let config = LlmConfig::default();
        assert!(create_provider(&config).unwrap().is_none());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = LlmConfig {
            provider: "mystery".to_string(),
            ..Default::default()
        };
        assert!(matches!(create_provider(&config), Err(ArchError::Config(_))));
    }

    #[test]
    fn test_usage_total() {
        let usage = TokenUsage {
            input_tokens: 100,
            output_tokens: 50,
        };
        assert_eq!(usage.total(), 150);
    }
}
