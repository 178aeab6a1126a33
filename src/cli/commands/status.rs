//! Status Command
//!
//! Display archlens project status.

use crate::cli::util::{CommandContext, is_initialized};
use crate::types::Result;

pub fn run(format: &str) -> Result<()> {
    let json_output = format == "json";

    if !is_initialized() {
        if json_output {
            println!("{{\"status\": \"not_initialized\"}}");
        } else {
            println!("archlens Status");
            println!("══════════════════════════════════════");
            println!("Not initialized. Run 'archlens init' first.");
        }
        return Ok(());
    }

    let ctx = CommandContext::load()?;
    let agents = ctx.manager.list_agents();
    let diagrams = ctx.manager.diagrams().len();
    let workflow = ctx.manager.workflow();

    if json_output {
        let status = serde_json::json!({
            "status": "initialized",
            "planner": workflow.planner_name(),
            "responder": workflow.responder_name(),
            "tools": workflow.registry().len(),
            "agents": agents,
            "max_agents": ctx.manager.max_agents(),
            "diagrams": diagrams,
            "repositories": ctx.config.repositories.root,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("archlens Status");
    println!("══════════════════════════════════════");
    println!(
        "Planner:      {} (provider: {})",
        workflow.planner_name(),
        ctx.config.llm.provider
    );
    println!("Responder:    {}", workflow.responder_name());
    println!("Tools:        {}", workflow.registry().len());
    println!(
        "Repositories: {}",
        ctx.config.repositories.root.display()
    );
    println!();
    println!("Agents:   {}/{}", agents.len(), ctx.manager.max_agents());
    for agent in &agents {
        println!("  {} ({})", agent.name, agent.status);
    }
    println!("Diagrams: {}", diagrams);
    println!();
    println!("State: {}", ctx.config.storage.path.display());

    Ok(())
}
