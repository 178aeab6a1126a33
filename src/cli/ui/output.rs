use console::style;

use crate::agent::TurnOutcome;
use crate::c4::DiagramView;

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    /// Print the answer to a message, then the diagram it produced
    pub fn turn(&self, outcome: &TurnOutcome) {
        if let Some(error) = &outcome.error {
            self.error(&format!("{}", error));
        }
        println!("{}", outcome.response);
        if let Some(view) = &outcome.view {
            self.view(view);
        }
    }

    pub fn view(&self, view: &DiagramView) {
        println!();
        for line in view.render().lines() {
            if line.trim_start().starts_with('*') {
                println!("{}", style(line).yellow().bold());
            } else {
                println!("{}", style(line).dim());
            }
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
