//! AnalyzeRequest: turning a message into tool calls
//!
//! [`RulePlanner`] routes on keywords and is fully deterministic.
//! [`LlmPlanner`] hands the message, the agent's state and the tool schemas to
//! the inference collaborator and trusts its structured decision.

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::context::AgentContext;
use crate::ai::{Completion, Inference};
use crate::c4::C4Level;
use crate::constants::llm::PROMPT_HISTORY_TURNS;
use crate::tools::{ToolCall, ToolRegistry};
use crate::types::{ArchError, Result};

/// What AnalyzeRequest decided
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub calls: Vec<ToolCall>,
    /// Direct answer from the planner when no tool is needed
    pub answer: Option<String>,
}

impl Plan {
    pub fn calls(calls: Vec<ToolCall>) -> Self {
        Self {
            calls,
            answer: None,
        }
    }

    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            calls: Vec::new(),
            answer: Some(text.into()),
        }
    }
}

/// Must not mutate the context or any diagram.
#[async_trait]
pub trait Planner: Send + Sync {
    fn name(&self) -> &str;

    async fn plan(&self, message: &str, ctx: &AgentContext, tools: &ToolRegistry) -> Result<Plan>;
}

// =============================================================================
// Rule Planner
// =============================================================================

pub struct RulePlanner {
    add_element: Regex,
    add_relation: Regex,
    drill_down: Regex,
    highlight: Regex,
    create_diagram: Regex,
    search: Regex,
    references: Regex,
    system_name: Regex,
    quoted: Regex,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| ArchError::Config(format!("invalid planner pattern '{}': {}", pattern, e)))
}

impl RulePlanner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            add_element: compile(
                r"(?i)^add\s+(?:an?\s+)?(?P<kind>person|external system|system|container|database|component|code)\s+(?:called\s+|named\s+)?(?P<name>.+?)(?:\s+(?:under|to|in|inside|within)\s+(?P<parent>.+?))?(?:\s+(?:using|with|on)\s+(?P<tech>.+?))?[.!]?$",
            )?,
            add_relation: compile(
                r"(?i)^(?:connect|link)\s+(?P<source>.+?)\s+(?:to|with|and)\s+(?P<target>.+?)(?:\s+(?:as|for|labell?ed)\s+(?P<label>.+?))?(?:\s+(?:via|over)\s+(?P<tech>.+?))?[.!]?$",
            )?,
            drill_down: compile(
                r"(?i)\b(?:drill\s+(?:down\s+)?(?:into|in|to)?|zoom\s+(?:in\s+)?(?:into|to|on)?|expand|open)\s+(?:the\s+)?(?P<target>[\w\-\s]+?)[.!?]?$",
            )?,
            highlight: compile(r"(?i)\bhighlight\s+(?P<targets>.+?)[.!?]?$")?,
            create_diagram: compile(
                r"(?i)\b(?:create|new|start)\s+(?:a\s+)?diagram\s+(?:for|of|called|named)\s+(?P<name>.+?)[.!?]?$",
            )?,
            search: compile(
                r"(?i)\b(?:search\s+(?:for\s+)?|grep\s+(?:for\s+)?|where\s+is\s+|find\s+code\s+(?:for\s+)?)(?P<query>.+?)(?:\s+in\s+(?P<repo>[\w.\-]+))?[.!?]?$",
            )?,
            references: compile(
                r"(?i)\b(?:references\s+(?:to|of)|usages?\s+of|who\s+uses|callers\s+of|find\s+references\s+(?:to|of|for))\s+(?P<term>.+?)[.!?]?$",
            )?,
            system_name: compile(
                r"(?i)\b(?:architecture|diagram|overview)\s+(?:of|for)\s+(?:the\s+)?(?P<name>[\w\-\s]+?)[.!?]?$",
            )?,
            quoted: compile(r#"["'`](?P<text>[^"'`]+)["'`]"#)?,
        })
    }

    /// Deterministic routing. Authoring commands are exclusive; navigation
    /// comes next; repository intents may combine with an architecture request.
    pub fn route(&self, message: &str, ctx: &AgentContext) -> Vec<ToolCall> {
        let text = message.trim();
        let lower = text.to_lowercase();

        if let Some(call) = self.route_authoring(text) {
            return vec![call];
        }
        if let Some(calls) = self.route_navigation(text, &lower) {
            return calls;
        }

        let mut calls = Vec::new();

        if mentions_any(
            &lower,
            &[
                "list repos",
                "list repositories",
                "list the repositories",
                "which repositories",
                "what repositories",
                "show repositories",
                "available repositories",
            ],
        ) {
            calls.push(ToolCall::new("list_repositories"));
        }

        if let Some(caps) = self.references.captures(text) {
            let term = self.unquote(&caps["term"]);
            calls.push(ToolCall::new("find_code_references").arg("term", term));
        } else if let Some(caps) = self.search.captures(text) {
            let mut call =
                ToolCall::new("search_code").arg("query", self.unquote(&caps["query"]));
            if let Some(repo) = caps
                .name("repo")
                .map(|m| m.as_str().to_string())
                .or_else(|| mentioned_repository(&lower, ctx))
            {
                call = call.arg("repo_id", repo);
            }
            calls.push(call);
        }

        if mentions_any(&lower, &["analyze", "analyse", "scan "]) {
            let target = mentioned_repository(&lower, ctx)
                .or_else(|| word_after(&lower, &["analyze", "analyse", "scan"]));
            match target {
                Some(repo) if repo != "repositories" && repo != "all" => {
                    calls.push(ToolCall::new("analyze_repository").arg("repo_id", repo));
                }
                _ if ctx.known_repositories.is_empty() && calls.is_empty() => {
                    calls.push(ToolCall::new("list_repositories"));
                }
                _ => {
                    for repo in ctx.known_repositories.keys() {
                        calls.push(
                            ToolCall::new("analyze_repository").arg("repo_id", repo.as_str()),
                        );
                    }
                }
            }
        }

        if let Some(caps) = self.create_diagram.captures(text) {
            let first = calls.len();
            calls.push(
                ToolCall::new("create_diagram").arg("system_name", self.unquote(&caps["name"])),
            );
            calls.push(ToolCall::new("drill_down").depends_on(first));
        } else if mentions_any(&lower, &["architecture", "diagram", "overview", "big picture"]) {
            if ctx.current_diagram.is_none() {
                let name = self.system_name(text, ctx);
                let first = calls.len();
                calls.push(ToolCall::new("create_diagram").arg("system_name", name));
                calls.push(ToolCall::new("drill_down").depends_on(first));
            } else {
                calls.push(ToolCall::new("drill_down"));
            }
        }

        calls
    }

    fn route_authoring(&self, text: &str) -> Option<ToolCall> {
        if let Some(caps) = self.add_element.captures(text) {
            let kind = caps["kind"].to_lowercase();
            let level = match kind.as_str() {
                "container" | "database" => C4Level::Container,
                "component" => C4Level::Component,
                "code" => C4Level::Code,
                _ => C4Level::Context,
            };
            let mut call = ToolCall::new("add_element")
                .arg("level", level.as_str())
                .arg("name", self.unquote(&caps["name"]))
                .arg("kind", kind.replace(' ', "_"));
            if let Some(parent) = caps.name("parent") {
                call = call.arg("parent_id", self.unquote(parent.as_str()));
            }
            if let Some(tech) = caps.name("tech") {
                call = call.arg("technology", tech.as_str().trim());
            }
            return Some(call);
        }

        if let Some(caps) = self.add_relation.captures(text) {
            let label = caps
                .name("label")
                .map(|m| self.unquote(m.as_str()))
                .unwrap_or_else(|| "uses".to_string());
            let mut call = ToolCall::new("add_relation")
                .arg("source_id", self.unquote(&caps["source"]))
                .arg("target_id", self.unquote(&caps["target"]))
                .arg("label", label);
            if let Some(tech) = caps.name("tech") {
                call = call.arg("technology", tech.as_str().trim());
            }
            return Some(call);
        }
        None
    }

    fn route_navigation(&self, text: &str, lower: &str) -> Option<Vec<ToolCall>> {
        if mentions_any(
            lower,
            &["drill up", "go up", "zoom out", "go back", "level up", "back up"],
        ) {
            return Some(vec![ToolCall::new("drill_up")]);
        }
        if let Some(caps) = self.highlight.captures(text) {
            let targets: Vec<String> = split_list(&caps["targets"])
                .into_iter()
                .map(|t| self.unquote(&t))
                .collect();
            return Some(vec![ToolCall::new("highlight").arg("element_ids", targets)]);
        }
        if let Some(caps) = self.drill_down.captures(text) {
            let target = self.unquote(&caps["target"]);
            let call = if target.is_empty()
                || matches!(target.to_lowercase().as_str(), "root" | "system")
            {
                ToolCall::new("drill_down")
            } else {
                ToolCall::new("drill_down").arg("element_id", target)
            };
            return Some(vec![call]);
        }
        if lower.trim_end_matches(['.', '!']) == "drill down" {
            return Some(vec![ToolCall::new("drill_down")]);
        }
        None
    }

    /// Name for a new diagram: explicit "architecture of X", else the only
    /// analyzed or known repository, else a generic name.
    fn system_name(&self, text: &str, ctx: &AgentContext) -> String {
        if let Some(caps) = self.system_name.captures(text) {
            let name = self.unquote(&caps["name"]);
            if !name.is_empty() {
                return name;
            }
        }
        if ctx.analyses.len() == 1
            && let Some(repo) = ctx.analyses.keys().next()
        {
            return repo.clone();
        }
        if ctx.known_repositories.len() == 1
            && let Some(repo) = ctx.known_repositories.keys().next()
        {
            return repo.clone();
        }
        "System".to_string()
    }

    fn unquote(&self, raw: &str) -> String {
        match self.quoted.captures(raw) {
            Some(caps) => caps["text"].trim().to_string(),
            None => raw.trim().trim_matches(['"', '\'', '`']).trim().to_string(),
        }
    }
}

#[async_trait]
impl Planner for RulePlanner {
    fn name(&self) -> &str {
        "rule"
    }

    async fn plan(&self, message: &str, ctx: &AgentContext, _tools: &ToolRegistry) -> Result<Plan> {
        let calls = self.route(message, ctx);
        debug!(calls = calls.len(), "Rule planner routed message");
        Ok(Plan::calls(calls))
    }
}

fn mentions_any(lower: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| lower.contains(n))
}

/// A known repository id appearing as a word in the message
fn mentioned_repository(lower: &str, ctx: &AgentContext) -> Option<String> {
    let words: Vec<&str> = lower
        .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_' || c == '.'))
        .collect();
    ctx.known_repositories
        .keys()
        .find(|id| words.iter().any(|w| w.trim_end_matches('.') == id.to_lowercase()))
        .cloned()
}

/// The word following any of `markers`, skipping filler
fn word_after(lower: &str, markers: &[&str]) -> Option<String> {
    const FILLER: &[&str] = &["the", "a", "an", "repo", "repository", "project", "code", "of"];
    let words: Vec<&str> = lower.split_whitespace().collect();
    let pos = words
        .iter()
        .position(|w| markers.contains(&w.trim_matches(|c: char| !c.is_alphanumeric())))?;
    words[pos + 1..]
        .iter()
        .map(|w| w.trim_matches(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_')))
        .find(|w| !w.is_empty() && !FILLER.contains(w))
        .map(str::to_string)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .flat_map(|part| part.split(" and "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// =============================================================================
// LLM Planner
// =============================================================================

pub struct LlmPlanner {
    inference: Inference,
}

impl LlmPlanner {
    pub fn new(inference: Inference) -> Self {
        Self { inference }
    }

    fn build_prompt(&self, message: &str, ctx: &AgentContext) -> String {
        let mut prompt = String::from(
            "You are an architecture assistant. Decide which tools to call, in order, to answer the user's message. \
             Tools mutate a C4 diagram (context > container > component > code) or read code repositories. \
             Use depends_on with the index of an earlier call when a call needs that call to have succeeded.\n\n",
        );
        prompt.push_str("## Agent state\n\n");
        prompt.push_str(&ctx.describe());
        prompt.push_str("\n\n");

        let history: Vec<_> = ctx.recent_exchanges(PROMPT_HISTORY_TURNS).collect();
        if !history.is_empty() {
            prompt.push_str("## Recent conversation\n\n");
            for exchange in history {
                prompt.push_str(&format!(
                    "User: {}\nAssistant: {}\n",
                    exchange.message, exchange.response
                ));
            }
            prompt.push('\n');
        }

        prompt.push_str("## Message\n\n");
        prompt.push_str(message);
        prompt
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    fn name(&self) -> &str {
        "llm"
    }

    async fn plan(&self, message: &str, ctx: &AgentContext, tools: &ToolRegistry) -> Result<Plan> {
        let prompt = self.build_prompt(message, ctx);
        match self.inference.complete(&prompt, &tools.schemas()).await? {
            Completion::ToolCalls(calls) => {
                debug!(calls = calls.len(), "Model planned tool calls");
                Ok(Plan::calls(calls))
            }
            Completion::Text(answer) => Ok(Plan::answer(answer)),
        }
    }
}
