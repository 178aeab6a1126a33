//! Config Command
//!
//! Usage:
//!   archlens config show [-g] [-f json]
//!   archlens config path
//!   archlens config init [-g] [--force]

use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show configuration
pub fn show(global: bool, format: &str) -> Result<()> {
    if global {
        match ConfigLoader::global_config_path() {
            Some(path) if path.exists() => {
                println!("# Global Config: {}\n", path.display());
                println!("{}", std::fs::read_to_string(&path)?);
            }
            Some(_) => {
                println!("No global config found.");
                println!("Run 'archlens config init --global' to create one.");
            }
            None => println!("Cannot determine global config directory."),
        }
        return Ok(());
    }

    let config = ConfigLoader::load()?;
    println!("{}", ConfigLoader::render(&config, format == "json")?);
    Ok(())
}

/// Show configuration paths
pub fn path() -> Result<()> {
    ConfigLoader::show_path();
    Ok(())
}

/// Initialize global configuration
pub fn init_global(force: bool) -> Result<()> {
    let path = ConfigLoader::init_global(force)?;
    Output::new().success("Initialized global configuration");
    println!("  Config: {}", path.display());
    Ok(())
}

/// Initialize project configuration
pub fn init_project() -> Result<()> {
    let root = std::env::current_dir()?;
    let dir = ConfigLoader::init_project(&root, None)?;
    Output::new().success("Initialized project configuration");
    println!("  Directory: {}", dir.display());
    println!(
        "  Config:    {}",
        ConfigLoader::project_config_path().display()
    );
    Ok(())
}
