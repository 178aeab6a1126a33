//! Prompt building utilities for LLM providers.

use serde_json::Value;

/// Append JSON schema instructions to a prompt.
///
/// Returns the original prompt if schema is null.
pub fn build_schema_prompt(user_prompt: &str, schema: &Value) -> String {
    if schema.is_null() {
        return user_prompt.to_string();
    }

    let schema_str = serde_json::to_string_pretty(schema).unwrap_or_default();
    format!(
        "{}\n\n---\n\nRespond with valid JSON matching this schema:\n```json\n{}\n```\n\nRespond ONLY with valid JSON, no explanation.",
        user_prompt, schema_str
    )
}
