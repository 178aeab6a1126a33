//! GenerateResponse: composing the answer from tool results
//!
//! Responders never fail. Every failed tool call is reported with its kind
//! and message whichever responder is used.

use async_trait::async_trait;
use tracing::warn;

use super::context::AgentContext;
use crate::ai::Inference;
use crate::tools::ToolResult;

#[async_trait]
pub trait Responder: Send + Sync {
    fn name(&self) -> &str;

    async fn respond(
        &self,
        message: &str,
        ctx: &AgentContext,
        planned_answer: Option<&str>,
        results: &[ToolResult],
    ) -> String;
}

const HELP: &str = "I could not map that request to an action. Try:\n\
  - \"list repositories\" or \"analyze <repo>\"\n\
  - \"search for <text> [in <repo>]\" or \"who uses <symbol>\"\n\
  - \"show architecture\" or \"create diagram for <system>\"\n\
  - \"add container <name> under <parent> [using <tech>]\", \"connect <a> to <b> as <label>\"\n\
  - \"drill down into <element>\", \"zoom out\", \"highlight <a>, <b>\"";

fn failure_lines(results: &[ToolResult]) -> Vec<String> {
    results
        .iter()
        .filter_map(|r| {
            r.failure()
                .map(|f| format!("- {} failed ({}): {}", r.tool, f.kind, f.message))
        })
        .collect()
}

/// Deterministic answer built from tool summaries
#[derive(Debug, Default, Clone)]
pub struct TemplateResponder;

impl TemplateResponder {
    pub fn render(&self, planned_answer: Option<&str>, results: &[ToolResult]) -> String {
        if results.is_empty() {
            return planned_answer.map_or_else(|| HELP.to_string(), str::to_string);
        }

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let mut lines = Vec::new();
        lines.push(match (succeeded, results.len()) {
            (s, n) if s == n => format!("Completed {} step{}:", n, plural(n)),
            (0, n) => format!("All {} step{} failed:", n, plural(n)),
            (s, n) => format!("Completed {} of {} steps:", s, n),
        });

        for result in results {
            if let Some(output) = result.output() {
                lines.push(format!("- {}: {}", result.tool, output.summary));
            }
        }
        lines.extend(failure_lines(results));

        if let Some(answer) = planned_answer {
            lines.push(String::new());
            lines.push(answer.to_string());
        }
        lines.join("\n")
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

#[async_trait]
impl Responder for TemplateResponder {
    fn name(&self) -> &str {
        "template"
    }

    async fn respond(
        &self,
        _message: &str,
        _ctx: &AgentContext,
        planned_answer: Option<&str>,
        results: &[ToolResult],
    ) -> String {
        self.render(planned_answer, results)
    }
}

/// Model-written answer; falls back to the template on inference failure
pub struct LlmResponder {
    inference: Inference,
    fallback: TemplateResponder,
}

impl LlmResponder {
    pub fn new(inference: Inference) -> Self {
        Self {
            inference,
            fallback: TemplateResponder,
        }
    }

    fn build_prompt(&self, message: &str, ctx: &AgentContext, results: &[ToolResult]) -> String {
        let mut prompt = String::from(
            "You are an architecture assistant. Answer the user's message using the tool results below. \
             Reference concrete results, mention failures plainly, and suggest a next step when useful.\n\n",
        );
        prompt.push_str("## Message\n\n");
        prompt.push_str(message);
        prompt.push_str("\n\n## Agent state\n\n");
        prompt.push_str(&ctx.describe());
        prompt.push_str("\n\n## Tool results\n\n");
        for result in results {
            match (result.output(), result.failure()) {
                (Some(output), _) => {
                    prompt.push_str(&format!("- {} succeeded: {}\n", result.tool, output.summary));
                    if !output.data.is_null() {
                        let data = output.data.to_string();
                        let data: String = data.chars().take(2000).collect();
                        prompt.push_str(&format!("  data: {}\n", data));
                    }
                    if let Some(view) = &output.view {
                        prompt.push_str(&format!("  view:\n{}\n", view.render()));
                    }
                }
                (None, Some(failure)) => {
                    prompt.push_str(&format!("- {} failed: {}\n", result.tool, failure));
                }
                (None, None) => {}
            }
        }
        if results.is_empty() {
            prompt.push_str("(no tools were run)\n");
        }
        prompt
    }
}

#[async_trait]
impl Responder for LlmResponder {
    fn name(&self) -> &str {
        "llm"
    }

    async fn respond(
        &self,
        message: &str,
        ctx: &AgentContext,
        planned_answer: Option<&str>,
        results: &[ToolResult],
    ) -> String {
        if results.is_empty()
            && let Some(answer) = planned_answer
        {
            return answer.to_string();
        }

        let prompt = self.build_prompt(message, ctx, results);
        match self.inference.generate_text(&prompt).await {
            Ok(mut text) => {
                let failures = failure_lines(results);
                if !failures.is_empty() {
                    text.push_str("\n\nFailed steps:\n");
                    text.push_str(&failures.join("\n"));
                }
                text
            }
            Err(e) => {
                warn!(error = %e, "Inference failed while writing the answer, using template");
                self.fallback.render(planned_answer, results)
            }
        }
    }
}
