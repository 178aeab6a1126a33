//! CLI Common Utilities
//!
//! Shared initialization and context management for CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::agent::AgentManager;
use crate::config::{Config, ConfigLoader};
use crate::storage::{Database, SharedDatabase};
use crate::types::{AgentId, ArchError, Result};

/// archlens directory name
pub const ARCHLENS_DIR: &str = ".archlens";

/// Command execution context
///
/// Loads configuration, opens the state database and restores every agent and
/// diagram saved by earlier invocations. Commands that change state call
/// [`save`](Self::save) before returning.
pub struct CommandContext {
    pub config: Config,
    pub db: SharedDatabase,
    pub manager: AgentManager,
}

impl CommandContext {
    pub fn load() -> Result<Self> {
        require_initialized()?;
        let config = ConfigLoader::load()?;
        let db = Database::open(&config.storage.path)?;
        let manager = AgentManager::from_config(&config)?;
        manager.restore(&db)?;

        Ok(Self {
            config,
            db: Arc::new(db),
            manager,
        })
    }

    pub async fn save(&self) -> Result<()> {
        self.manager.persist(&self.db).await
    }

    /// Resolve an agent by name, falling back to its id
    pub fn resolve_agent(&self, name_or_id: &str) -> Result<AgentId> {
        if let Some(id) = self.manager.find_by_name(name_or_id) {
            return Ok(id);
        }
        let id = AgentId::new(name_or_id.trim());
        if self.manager.list_agents().iter().any(|a| a.id == id) {
            return Ok(id);
        }
        Err(ArchError::not_found("agent", name_or_id))
    }
}

/// Require archlens to be initialized
///
/// Returns the .archlens directory path if initialized.
pub fn require_initialized() -> Result<PathBuf> {
    let dir = Path::new(ARCHLENS_DIR);
    if !dir.exists() {
        return Err(ArchError::invalid_state(
            "archlens is not initialized here; run 'archlens init' first",
        ));
    }
    Ok(dir.to_path_buf())
}

/// Check if archlens is initialized
pub fn is_initialized() -> bool {
    Path::new(ARCHLENS_DIR).exists()
}

// Tests disabled: changing the current directory in tests races with other
// tests running in parallel. Command behavior is covered through the library.
