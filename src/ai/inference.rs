//! Inference collaborator
//!
//! Wraps an [`LlmProvider`] into the two questions the workflow asks a model:
//! "which tools should run for this message" and "write the answer". The
//! provider only ever sees a prompt and a JSON schema.

use std::time::Duration;

use serde_json::{Value, json};
use tracing::debug;

use super::provider::SharedProvider;
use super::timeout::with_timeout;
use crate::tools::ToolCall;
use crate::types::{ArchError, Result};

/// A structured model decision
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Free text; no tools needed
    Text(String),
    ToolCalls(Vec<ToolCall>),
}

#[derive(Clone)]
pub struct Inference {
    provider: SharedProvider,
    timeout: Duration,
}

impl Inference {
    pub fn new(provider: SharedProvider, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub async fn health_check(&self) -> Result<bool> {
        self.provider.health_check().await
    }

    /// Ask the model for tool calls (or a direct answer) given the tool catalog
    pub async fn complete(&self, prompt: &str, tool_schemas: &Value) -> Result<Completion> {
        let catalog =
            serde_json::to_string_pretty(tool_schemas).unwrap_or_else(|_| tool_schemas.to_string());
        let full_prompt = format!(
            "{}\n\n## Available tools\n\n{}\n\nReply with {{\"tool_calls\": [{{\"tool\": ..., \"args\": {{...}}, \"depends_on\": [...]}}]}} to run tools in order, or {{\"answer\": \"...\"}} when no tool is needed.",
            prompt, catalog
        );

        let response = with_timeout(
            self.timeout,
            self.provider.generate(&full_prompt, &decision_schema()),
            "inference",
        )
        .await?;
        debug!(
            provider = self.provider.name(),
            tokens = response.usage.total(),
            elapsed_ms = response.elapsed_ms,
            "Planner decision received"
        );

        parse_decision(&response.content)
    }

    /// Ask the model for prose
    pub async fn generate_text(&self, prompt: &str) -> Result<String> {
        let schema = json!({
            "type": "object",
            "properties": {"answer": {"type": "string"}},
            "required": ["answer"],
        });
        let response = with_timeout(
            self.timeout,
            self.provider.generate(prompt, &schema),
            "inference",
        )
        .await?;

        match &response.content {
            Value::String(text) => Ok(text.clone()),
            content => content
                .get("answer")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ArchError::upstream("inference", "response has no answer field")),
        }
    }
}

fn decision_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "tool_calls": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "tool": {"type": "string"},
                        "args": {"type": "object"},
                        "depends_on": {"type": "array", "items": {"type": "integer"}},
                    },
                    "required": ["tool"],
                }
            },
            "answer": {"type": "string"},
        }
    })
}

/// Interpret a model decision. Tool calls win over an answer when both are present.
pub fn parse_decision(content: &Value) -> Result<Completion> {
    if let Some(calls) = content.get("tool_calls").filter(|c| !is_empty_array(c)) {
        let calls: Vec<ToolCall> = serde_json::from_value(calls.clone()).map_err(|e| {
            ArchError::upstream("inference", format!("malformed tool calls: {}", e))
        })?;
        return Ok(Completion::ToolCalls(calls));
    }

    if let Some(answer) = content.get("answer").and_then(Value::as_str) {
        return Ok(Completion::Text(answer.to_string()));
    }
    if let Value::String(text) = content {
        return Ok(Completion::Text(text.clone()));
    }
    if content.get("tool_calls").is_some() {
        return Ok(Completion::ToolCalls(Vec::new()));
    }

    Err(ArchError::upstream(
        "inference",
        "model output has neither tool_calls nor answer",
    ))
}

fn is_empty_array(value: &Value) -> bool {
    value.as_array().is_some_and(Vec::is_empty)
}


#[cfg(test)]
mod tests {
    use super::test_support::ScriptedProvider;
    use super::*;
    use crate::types::ErrorKind;

    #[test]
    fn test_parse_tool_calls() {
        let content = json!({
            "tool_calls": [
                {"tool": "create_diagram", "args": {"system_name": "Shop"}},
                {"name": "drill_down", "arguments": {}, "depends_on": [0]}
            ]
        });
        let Completion::ToolCalls(calls) = parse_decision(&content).unwrap() else {
            panic!("expected tool calls");
        };
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].tool, "drill_down");
        assert_eq!(calls[1].depends_on, vec![0]);
    }

    #[test]
    fn test_parse_answer() {
        let content = json!({"tool_calls": [], "answer": "Nothing to do."});
        assert_eq!(
            parse_decision(&content).unwrap(),
            Completion::Text("Nothing to do.".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_unknown_shape() {
        let err = parse_decision(&json!({"plan": "??"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Upstream);
    }

    #[test]
    fn test_parse_rejects_malformed_calls() {
        let err = parse_decision(&json!({"tool_calls": [{"args": {}}]})).unwrap_err();
        assert!(err.to_string().contains("malformed tool calls"));
    }

    #[tokio::test]
    async fn test_complete_includes_catalog() {
        let provider = ScriptedProvider::new(vec![Ok(json!({"answer": "hi"}))]);
        let inference = Inference::new(provider.clone(), Duration::from_secs(5));

        let completion = inference
            .complete("hello", &json!([{"name": "drill_up"}]))
            .await
            .unwrap();

        assert_eq!(completion, Completion::Text("hi".to_string()));
        let prompts = provider.prompts.lock().unwrap();
        assert!(prompts[0].contains("drill_up"));
    }

    #[tokio::test]
    async fn test_generate_text_requires_answer() {
        let provider = ScriptedProvider::new(vec![Ok(json!({"answer": "Shop has 2 containers"})), Ok(json!({}))]);
        let inference = Inference::new(provider, Duration::from_secs(5));
        assert_eq!(
            inference.generate_text("q").await.unwrap(),
            "Shop has 2 containers"
        );
        assert!(inference.generate_text("q").await.is_err());
    }
}
