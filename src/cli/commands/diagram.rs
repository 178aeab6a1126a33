//! Diagram Command
//!
//! Usage:
//!   archlens diagram list
//!   archlens diagram show ID [--format text|json|dot|mermaid]

use crate::c4::ExportFormat;
use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::types::{DiagramId, Result};

pub fn list() -> Result<()> {
    let ctx = CommandContext::load()?;
    let diagrams = ctx.manager.diagrams().list();

    if diagrams.is_empty() {
        println!("No diagrams yet. Ask an agent to \"show architecture\".");
        return Ok(());
    }

    Output::new().section(&format!("Diagrams ({})", diagrams.len()));
    for d in diagrams {
        println!(
            "  {:<16} {:<24} {} elements, {} relations",
            d.id.as_str(), d.name, d.element_count, d.relation_count
        );
    }
    Ok(())
}

pub fn show(id: &str, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let id = DiagramId::new(id);
    let store = ctx.manager.diagrams();

    if format == "text" {
        let view = store.view(&id)?;
        let out = Output::new();
        out.header(&view.diagram_name);
        for entry in store.hierarchy(&id)? {
            println!(
                "  {} {} [{}] -> {}",
                entry.id,
                entry.name,
                entry.level,
                if entry.children.is_empty() {
                    "-".to_string()
                } else {
                    entry.children.join(", ")
                }
            );
        }
        out.view(&view);
        return Ok(());
    }

    let format: ExportFormat = format.parse()?;
    println!("{}", store.export(&id, format)?);
    Ok(())
}
