//! Ask and Chat Commands
//!
//! `ask` sends one message to an agent; `chat` reads messages from stdin, one
//! per line, until EOF or `exit`. State is saved after every turn.

use std::io::{BufRead, Write};

use console::style;

use crate::cli::ui::Output;
use crate::cli::util::CommandContext;
use crate::types::Result;

pub async fn ask(agent: &str, message: &str, trace: bool) -> Result<()> {
    let ctx = CommandContext::load()?;
    let id = ctx.resolve_agent(agent)?;

    let outcome = ctx.manager.process_message(&id, message).await?;
    ctx.save().await?;

    Output::new().turn(&outcome);
    if trace {
        println!();
        println!("{}", serde_json::to_string_pretty(&outcome.trace)?);
    }
    Ok(())
}

pub async fn chat(agent: &str) -> Result<()> {
    let ctx = CommandContext::load()?;
    let id = ctx.resolve_agent(agent)?;
    let out = Output::new();

    out.info(&format!(
        "Chatting with '{}'. Type 'exit' or press Ctrl-D to leave.",
        agent
    ));

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("{} ", style(">").cyan().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line?;
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if matches!(message, "exit" | "quit") {
            break;
        }

        let outcome = ctx.manager.process_message(&id, message).await?;
        out.turn(&outcome);
        ctx.save().await?;
        println!();
    }
    Ok(())
}
