//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/archlens/) and project (.archlens/) level configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants;
use crate::types::{ArchError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Inference provider settings
    pub llm: LlmConfig,

    /// Agent manager settings
    pub agents: AgentsConfig,

    /// Where repositories are read from
    pub repositories: RepositoriesConfig,

    /// Timeouts for external collaborators
    pub timeouts: TimeoutsConfig,

    /// Persistent state
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            llm: LlmConfig::default(),
            agents: AgentsConfig::default(),
            repositories: RepositoriesConfig::default(),
            timeouts: TimeoutsConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `ArchError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.llm.provider.as_str(), "rule" | "ollama" | "openai") {
            return Err(ArchError::Config(format!(
                "Unknown LLM provider '{}'. Supported: rule, ollama, openai",
                self.llm.provider
            )));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ArchError::Config(format!(
                "LLM temperature must be between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.timeout_secs == 0 {
            return Err(ArchError::Config(
                "LLM timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.agents.max_agents == 0 {
            return Err(ArchError::Config(
                "agents.max_agents must be greater than 0".to_string(),
            ));
        }

        if self.agents.history_limit == 0
            || self.agents.history_limit > constants::agents::MAX_HISTORY_LIMIT
        {
            return Err(ArchError::Config(format!(
                "agents.history_limit must be between 1 and {}, got {}",
                constants::agents::MAX_HISTORY_LIMIT,
                self.agents.history_limit
            )));
        }

        if self.repositories.max_file_size == 0 {
            return Err(ArchError::Config(
                "repositories.max_file_size must be greater than 0".to_string(),
            ));
        }

        for pattern in &self.repositories.exclude {
            glob::Pattern::new(pattern).map_err(|e| {
                ArchError::Config(format!("Invalid exclude pattern '{}': {}", pattern, e))
            })?;
        }

        if self.timeouts.repository_secs == 0 || self.timeouts.scanner_secs == 0 {
            return Err(ArchError::Config(
                "timeouts must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// LLM Configuration
// =============================================================================

/// Inference provider settings
///
/// Note: API keys are never serialized to output and are redacted in debug output.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: "rule" (no model), "ollama", "openai"
    pub provider: String,

    /// Model name (provider default when unset)
    pub model: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// API key; falls back to OPENAI_API_KEY for the openai provider
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Temperature for generation (0.0 = deterministic)
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum tokens to generate
    pub max_tokens: usize,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "rule".to_string(),
            model: None,
            api_base: None,
            api_key: None,
            temperature: constants::llm::DEFAULT_TEMPERATURE,
            timeout_secs: constants::network::DEFAULT_TIMEOUT_SECS,
            max_tokens: 2048,
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether turns are planned by a model rather than keyword rules
    pub fn uses_model(&self) -> bool {
        self.provider != "rule"
    }
}

// =============================================================================
// Agents Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// Maximum number of live agents
    pub max_agents: usize,

    /// Exchanges kept per agent transcript
    pub history_limit: usize,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            max_agents: constants::agents::DEFAULT_MAX_AGENTS,
            history_limit: constants::agents::DEFAULT_HISTORY_LIMIT,
        }
    }
}

// =============================================================================
// Repositories Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoriesConfig {
    /// Directory whose subdirectories are repository checkouts
    pub root: PathBuf,

    /// Glob patterns to exclude (relative to each repository)
    pub exclude: Vec<String>,

    /// Maximum file size in bytes
    pub max_file_size: u64,
}

impl Default for RepositoriesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("repos"),
            exclude: vec!["**/*.min.js".to_string(), "**/*.lock".to_string()],
            max_file_size: constants::repository::DEFAULT_MAX_FILE_SIZE,
        }
    }
}

// =============================================================================
// Timeouts Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Repository listing, fetching and search
    pub repository_secs: u64,

    /// Code analysis of one repository
    pub scanner_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            repository_secs: constants::timeouts::DEFAULT_REPOSITORY_SECS,
            scanner_secs: constants::timeouts::DEFAULT_SCANNER_SECS,
        }
    }
}

// =============================================================================
// Storage Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database holding diagrams and agents
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".archlens/state.db"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.llm.provider, "rule");
        assert_eq!(config.agents.max_agents, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.llm.temperature = 3.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.llm.provider = "claude".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.agents.history_limit = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.repositories.exclude = vec!["[".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_never_serialized() {
        let mut config = Config::default();
        config.llm.api_key = Some("sk-secret".to_string());
        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(!rendered.contains("sk-secret"));
        assert!(!format!("{:?}", config.llm).contains("sk-secret"));
    }
}
