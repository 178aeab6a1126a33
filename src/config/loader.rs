//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/archlens/config.toml)
//! 3. Project config (.archlens/config.toml)
//! 4. Environment variables (ARCHLENS_* prefix, `__` separates sections)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::types::{ArchError, Result};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        Self::load_with(Self::global_config_path(), &Self::project_config_path())
    }

    /// Load with explicit global and project file locations
    pub fn load_with(global: Option<PathBuf>, project: &Path) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = global
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        if project.exists() {
            debug!("Loading project config from: {}", project.display());
            figment = figment.merge(Toml::file(project));
        }

        // e.g. ARCHLENS_LLM__MODEL -> llm.model, ARCHLENS_AGENTS__MAX_AGENTS -> agents.max_agents
        figment = figment.merge(Env::prefixed("ARCHLENS_").split("__").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| ArchError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| ArchError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/archlens/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("archlens"))
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    /// Get project data directory
    pub fn project_dir() -> PathBuf {
        PathBuf::from(".archlens")
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path() {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());
    }

    /// Render the effective configuration
    pub fn render(config: &Config, as_json: bool) -> Result<String> {
        if as_json {
            Ok(serde_json::to_string_pretty(config)?)
        } else {
            toml::to_string_pretty(config).map_err(|e| ArchError::Config(e.to_string()))
        }
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            ArchError::Config("Cannot determine global config directory".to_string())
        })?;
        fs::create_dir_all(&global_dir)?;

        let config_path = global_dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_global_config())?;
            info!("Created global config: {}", config_path.display());
        } else {
            info!("Global config exists: {}", config_path.display());
        }

        Ok(config_path)
    }

    /// Initialize project configuration under `base`
    pub fn init_project(base: &Path, repos_root: Option<&Path>) -> Result<PathBuf> {
        let project_dir = base.join(Self::project_dir());
        fs::create_dir_all(&project_dir)?;

        let config_path = project_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, Self::default_project_config(repos_root))?;
            info!("Created project config: {}", config_path.display());
        }

        Ok(project_dir)
    }

    /// Check if project is initialized
    pub fn is_project_initialized() -> bool {
        Self::project_dir().exists()
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn default_global_config() -> String {
        r#"# archlens Global Configuration
# User-wide defaults. Project settings in .archlens/config.toml override these.

version = "1.0"

# Inference: "rule" (keyword routing, no model), "ollama" or "openai"
[llm]
provider = "rule"
timeout_secs = 120

[agents]
max_agents = 10
history_limit = 50
"#
        .to_string()
    }

    fn default_project_config(repos_root: Option<&Path>) -> String {
        let root = repos_root
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "repos".to_string());
        format!(
            r#"# archlens Project Configuration
# Project-specific settings that override global defaults.

version = "1.0"

[repositories]
root = "{}"
exclude = ["**/*.min.js", "**/*.lock"]

[timeouts]
repository_secs = 30
scanner_secs = 60

[storage]
path = ".archlens/state.db"
"#,
            root.replace('\\', "/")
        )
    }
}
