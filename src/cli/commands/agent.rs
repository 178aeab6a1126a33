//! Agent Command
//!
//! Usage:
//!   archlens agent create NAME
//!   archlens agent list [-f json]
//!   archlens agent delete NAME
//!   archlens agent show NAME [-f json]

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::types::Result;

pub async fn create(name: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let id = ctx.manager.create_agent(name)?;
    ctx.save().await?;

    Output::new().success(&format!("Created agent '{}' ({})", name.trim(), id));
    Ok(())
}

pub fn list(format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let agents = ctx.manager.list_agents();

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&agents)?);
        return Ok(());
    }

    if agents.is_empty() {
        println!("No agents. Create one with 'archlens agent create NAME'.");
        return Ok(());
    }

    let out = Output::new();
    out.section(&format!(
        "Agents ({}/{})",
        agents.len(),
        ctx.manager.max_agents()
    ));
    for agent in agents {
        println!(
            "  {:<20} {:<6} {}  last active {}",
            agent.name,
            agent.status.to_string(),
            agent.id,
            agent.last_activity.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

pub async fn delete(name: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    match ctx.resolve_agent(name) {
        Ok(id) => {
            ctx.manager.delete_agent(&id);
            ctx.save().await?;
            Output::new().success(&format!("Deleted agent '{}'", name));
        }
        Err(_) => Output::new().info(&format!("No agent named '{}'", name)),
    }
    Ok(())
}

pub async fn show(name: &str, format: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let id = ctx.resolve_agent(name)?;
    let agent = ctx.manager.get_context(&id).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&agent)?);
        return Ok(());
    }

    let out = Output::new();
    out.header(&format!("Agent {}", agent.name));
    println!("{}", agent.describe());

    if agent.transcript_len() > 0 {
        out.section("Recent exchanges");
        for exchange in agent.recent_exchanges(5) {
            println!("> {}", exchange.message);
            println!("{}", exchange.response);
            println!();
        }
    }

    if let Some(diagram) = &agent.current_diagram
        && let Ok(view) = ctx.manager.diagrams().view(diagram)
    {
        out.view(&view);
    }
    Ok(())
}
