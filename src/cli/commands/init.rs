//! Init Command
//!
//! Initialize archlens in the current directory.

use std::path::Path;

use crate::cli::ui::Output;
use crate::cli::util::ARCHLENS_DIR;
use crate::config::ConfigLoader;
use crate::storage::Database;
use crate::types::{ArchError, Result};

pub fn run(force: bool, repos: Option<&Path>) -> Result<()> {
    let root = std::env::current_dir()?;
    let dir = root.join(ARCHLENS_DIR);

    if dir.exists() && !force {
        return Err(ArchError::Config(
            "Already initialized. Use --force to overwrite.".to_string(),
        ));
    }

    ConfigLoader::init_project(&root, repos)?;

    if let Err(e) = ConfigLoader::init_global(false) {
        tracing::debug!("Global config init skipped: {}", e);
    }

    let config = ConfigLoader::load()?;
    let db = Database::open(&config.storage.path)?;
    let (diagrams, agents) = db.counts()?;

    let out = Output::new();
    out.success(&format!("Initialized archlens in {}/", ARCHLENS_DIR));
    println!("  Repositories: {}", config.repositories.root.display());
    println!("  State:        {}", config.storage.path.display());
    if diagrams + agents > 0 {
        println!("  Kept {} agent(s) and {} diagram(s)", agents, diagrams);
    }
    println!();
    println!("Next steps:");
    println!("  1. archlens agent create architect");
    println!("  2. archlens ask --agent architect \"show architecture\"");

    Ok(())
}
