//! Tool Registry
//!
//! Named, schema-described operations the workflow can invoke. Each tool
//! declares its arguments up front; the registry checks a call against that
//! declaration before anything runs, and turns every execution error into a
//! typed [`ToolResult`] failure instead of propagating it.
//!
//! ## Catalog
//!
//! | tool | effect |
//! |------|--------|
//! | `list_repositories` | mutates context |
//! | `analyze_repository` | mutates context |
//! | `search_code` | mutates context (search history) |
//! | `find_code_references` | mutates context (search history) |
//! | `create_diagram` | mutates diagram |
//! | `add_element` / `add_relation` | mutates diagram |
//! | `drill_down` / `drill_up` / `highlight` | mutates diagram (navigation) |

mod diagram;
mod repository;

pub use diagram::{AddElement, AddRelation, CreateDiagram, DrillDown, DrillUp, Highlight};
pub use repository::{AnalyzeRepository, FindCodeReferences, ListRepositories, SearchCode};

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::agent::AgentContext;
use crate::ai::TimeoutConfig;
use crate::c4::{C4Level, DiagramStore, DiagramView};
use crate::repository::{CodeScanner, RepositorySource};
use crate::types::{ArchError, DiagramId, ErrorKind, ErrorReport, Result};

// =============================================================================
// Schema
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgType {
    String,
    StringList,
    /// A C4 level name
    Level,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArgSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub ty: ArgType,
    pub required: bool,
    pub description: &'static str,
}

impl ArgSpec {
    pub const fn required(name: &'static str, ty: ArgType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            required: true,
            description,
        }
    }

    pub const fn optional(name: &'static str, ty: ArgType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            required: false,
            description,
        }
    }

    fn json_schema(&self) -> Value {
        match self.ty {
            ArgType::String => json!({"type": "string", "description": self.description}),
            ArgType::StringList => json!({
                "type": "array",
                "items": {"type": "string"},
                "description": self.description,
            }),
            ArgType::Level => json!({
                "type": "string",
                "enum": C4Level::ALL.iter().map(|l| l.as_str()).collect::<Vec<_>>(),
                "description": self.description,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SideEffect {
    /// Changes nothing but the agent's search history
    ReadOnly,
    MutatesContext,
    MutatesDiagram,
}

impl fmt::Display for SideEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReadOnly => "read-only",
            Self::MutatesContext => "mutates-context",
            Self::MutatesDiagram => "mutates-diagram",
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub args: Vec<ArgSpec>,
    pub effect: SideEffect,
}

impl ToolSpec {
    /// Function-calling style schema for inference prompts
    pub fn json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .args
            .iter()
            .map(|a| (a.name.to_string(), a.json_schema()))
            .collect();
        let required: Vec<&str> = self.args.iter().filter(|a| a.required).map(|a| a.name).collect();
        json!({
            "name": self.name,
            "description": self.description,
            "side_effect": self.effect.to_string(),
            "parameters": {
                "type": "object",
                "properties": properties,
                "required": required,
                "additionalProperties": false,
            }
        })
    }

    fn arg(&self, name: &str) -> Option<&ArgSpec> {
        self.args.iter().find(|a| a.name == name)
    }
}

// =============================================================================
// Calls and Results
// =============================================================================

/// A requested invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(alias = "name")]
    pub tool: String,
    #[serde(default, alias = "arguments")]
    pub args: Map<String, Value>,
    /// Indices of earlier calls in the same turn this call needs to have succeeded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<usize>,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            args: Map::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(name.into(), value.into());
        self
    }

    pub fn depends_on(mut self, index: usize) -> Self {
        self.depends_on.push(index);
        self
    }
}

impl fmt::Display for ToolCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.tool, Value::Object(self.args.clone()))
    }
}

/// Arguments that passed validation against a [`ToolSpec`]
#[derive(Debug, Clone)]
pub struct ToolArgs {
    tool: &'static str,
    values: Map<String, Value>,
}

impl ToolArgs {
    /// Required string argument
    pub fn str(&self, name: &str) -> Result<&str> {
        self.opt_str(name)
            .ok_or_else(|| ArchError::schema(self.tool, format!("missing required argument '{}'", name)))
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    pub fn string_list(&self, name: &str) -> Result<Vec<String>> {
        let items = self
            .values
            .get(name)
            .and_then(Value::as_array)
            .ok_or_else(|| ArchError::schema(self.tool, format!("missing required argument '{}'", name)))?;
        Ok(items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect())
    }

    pub fn level(&self, name: &str) -> Result<C4Level> {
        self.str(name)?.parse()
    }
}

/// Successful tool payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// One-line human summary
    pub summary: String,
    #[serde(default)]
    pub data: Value,
    /// Diagram view after the call, for navigation and authoring tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<DiagramView>,
}

impl ToolOutput {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            data: Value::Null,
            view: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_view(mut self, view: DiagramView) -> Self {
        self.view = Some(view);
        self
    }
}

/// Typed failure carried inside a [`ToolResult`]
pub type ToolFailure = ErrorReport;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success(ToolOutput),
    Failure(ToolFailure),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Position of the call in the turn
    pub index: usize,
    pub tool: String,
    pub outcome: ToolOutcome,
    pub elapsed_ms: u64,
}

impl ToolResult {
    pub fn failed(index: usize, tool: impl Into<String>, error: &ArchError) -> Self {
        Self {
            index,
            tool: tool.into(),
            outcome: ToolOutcome::Failure(error.into()),
            elapsed_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success(_))
    }

    pub fn output(&self) -> Option<&ToolOutput> {
        match &self.outcome {
            ToolOutcome::Success(output) => Some(output),
            ToolOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ToolFailure> {
        match &self.outcome {
            ToolOutcome::Failure(failure) => Some(failure),
            ToolOutcome::Success(_) => None,
        }
    }

    pub fn failure_kind(&self) -> Option<ErrorKind> {
        self.failure().map(|f| f.kind)
    }
}

// =============================================================================
// Tool Trait and Environment
// =============================================================================

/// Shared collaborators every tool may use
#[derive(Clone)]
pub struct ToolEnv {
    pub diagrams: Arc<DiagramStore>,
    pub source: Arc<dyn RepositorySource>,
    pub scanner: Arc<dyn CodeScanner>,
    pub timeouts: TimeoutConfig,
}

impl ToolEnv {
    pub fn new(
        diagrams: Arc<DiagramStore>,
        source: Arc<dyn RepositorySource>,
        scanner: Arc<dyn CodeScanner>,
        timeouts: TimeoutConfig,
    ) -> Self {
        Self {
            diagrams,
            source,
            scanner,
            timeouts,
        }
    }
}

/// The agent's current diagram, or `InvalidState` when there is none
pub(crate) fn current_diagram(ctx: &AgentContext) -> Result<DiagramId> {
    ctx.current_diagram
        .clone()
        .ok_or_else(|| ArchError::invalid_state("no current diagram; create one with create_diagram first"))
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;

    async fn execute(
        &self,
        args: &ToolArgs,
        ctx: &mut AgentContext,
        env: &ToolEnv,
    ) -> Result<ToolOutput>;
}

// =============================================================================
// Registry
// =============================================================================

struct Registered {
    spec: ToolSpec,
    tool: Box<dyn Tool>,
}

/// Name-keyed tool catalog; dispatch is a map lookup
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Registered>,
    /// Registration order, for stable schema output
    order: Vec<&'static str>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the ten built-in tools
    pub fn with_builtin_tools() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Box::new(ListRepositories))?;
        registry.register(Box::new(AnalyzeRepository))?;
        registry.register(Box::new(SearchCode))?;
        registry.register(Box::new(FindCodeReferences))?;
        registry.register(Box::new(CreateDiagram))?;
        registry.register(Box::new(AddElement))?;
        registry.register(Box::new(AddRelation))?;
        registry.register(Box::new(DrillDown))?;
        registry.register(Box::new(DrillUp))?;
        registry.register(Box::new(Highlight))?;
        Ok(registry)
    }

    /// Add a tool; duplicate tool names or argument names are a `Conflict`
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<()> {
        let spec = tool.spec();
        if self.tools.contains_key(spec.name) {
            return Err(ArchError::conflict(format!(
                "tool '{}' is already registered",
                spec.name
            )));
        }
        let mut seen = HashSet::new();
        for arg in &spec.args {
            if !seen.insert(arg.name) {
                return Err(ArchError::conflict(format!(
                    "tool '{}' declares argument '{}' twice",
                    spec.name, arg.name
                )));
            }
        }

        debug!(tool = spec.name, "Registered tool");
        self.order.push(spec.name);
        self.tools.insert(spec.name, Registered { spec, tool });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name).map(|r| &r.spec)
    }

    pub fn specs(&self) -> impl Iterator<Item = &ToolSpec> {
        self.order.iter().filter_map(|name| self.spec(name))
    }

    /// JSON array of every tool schema, in registration order
    pub fn schemas(&self) -> Value {
        Value::Array(self.specs().map(ToolSpec::json_schema).collect())
    }

    /// Check a call against its tool's declared arguments
    pub fn validate(&self, call: &ToolCall) -> Result<ToolArgs> {
        let spec = self
            .spec(&call.tool)
            .ok_or_else(|| ArchError::schema(&call.tool, "unknown tool"))?;

        if let Some(unexpected) = call.args.keys().find(|k| spec.arg(k).is_none()) {
            return Err(ArchError::schema(
                spec.name,
                format!("unexpected argument '{}'", unexpected),
            ));
        }

        let mut values = Map::new();
        for arg in &spec.args {
            match call.args.get(arg.name) {
                None | Some(Value::Null) if arg.required => {
                    return Err(ArchError::schema(
                        spec.name,
                        format!("missing required argument '{}'", arg.name),
                    ));
                }
                None | Some(Value::Null) => {}
                Some(value) => {
                    check_type(spec.name, arg, value)?;
                    values.insert(arg.name.to_string(), value.clone());
                }
            }
        }

        Ok(ToolArgs {
            tool: spec.name,
            values,
        })
    }

    /// Validate and run one call. Never fails: errors become a failed [`ToolResult`].
    pub async fn dispatch(
        &self,
        index: usize,
        call: &ToolCall,
        ctx: &mut AgentContext,
        env: &ToolEnv,
    ) -> ToolResult {
        let start = Instant::now();
        let outcome = match self.validate(call) {
            Ok(args) => {
                debug!(index, tool = %call.tool, "Dispatching tool");
                match self.tools.get(call.tool.as_str()) {
                    Some(registered) => registered.tool.execute(&args, ctx, env).await,
                    None => Err(ArchError::schema(&call.tool, "unknown tool")),
                }
            }
            Err(e) => Err(e),
        };

        let outcome = match outcome {
            Ok(output) => ToolOutcome::Success(output),
            Err(e) => {
                warn!(index, tool = %call.tool, error = %e, "Tool call failed");
                ToolOutcome::Failure(ErrorReport::from(&e))
            }
        };

        ToolResult {
            index,
            tool: call.tool.clone(),
            outcome,
            elapsed_ms: start.elapsed().as_millis() as u64,
        }
    }
}

fn check_type(tool: &str, arg: &ArgSpec, value: &Value) -> Result<()> {
    let ok = match arg.ty {
        ArgType::String => value.is_string(),
        ArgType::StringList => value
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string)),
        ArgType::Level => value
            .as_str()
            .is_some_and(|s| s.parse::<C4Level>().is_ok()),
    };
    if ok {
        return Ok(());
    }

    let expected = match arg.ty {
        ArgType::String => "a string".to_string(),
        ArgType::StringList => "a list of strings".to_string(),
        ArgType::Level => format!(
            "one of {}",
            C4Level::ALL.iter().map(|l| l.as_str()).collect::<Vec<_>>().join(", ")
        ),
    };
    Err(ArchError::schema(
        tool,
        format!("argument '{}' must be {}", arg.name, expected),
    ))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use super::*;
    use crate::repository::{
        AnalysisResult, CodeMatch, FileEntry, FileTree, HeuristicScanner, RepositoryInfo,
    };

    /// In-memory repository source with one Python repository "shop"
    pub struct FakeSource;

    #[async_trait]
    impl RepositorySource for FakeSource {
        async fn list_repositories(&self) -> Result<Vec<RepositoryInfo>> {
            Ok(vec![RepositoryInfo {
                id: "shop".to_string(),
                name: "shop".to_string(),
                url: "file:///repos/shop/".to_string(),
                default_branch: Some("main".to_string()),
                language: Some("python".to_string()),
            }])
        }

        async fn fetch_structure(&self, repo_id: &str) -> Result<FileTree> {
            if repo_id != "shop" {
                return Err(ArchError::not_found("repository", repo_id));
            }
            Ok(FileTree {
                files: vec![FileEntry {
                    path: "orders/service.py".to_string(),
                    content: "import requests\n\nclass OrderService:\n    def checkout(self):\n        pass\n"
                        .to_string(),
                }],
            })
        }

        async fn search_code(&self, repo_id: &str, query: &str) -> Result<Vec<CodeMatch>> {
            if repo_id != "shop" {
                return Err(ArchError::not_found("repository", repo_id));
            }
            if !"checkout".contains(&query.to_lowercase()) {
                return Ok(Vec::new());
            }
            Ok(vec![CodeMatch {
                repo_id: repo_id.to_string(),
                path: "orders/service.py".to_string(),
                line: 4,
                snippet: "def checkout(self):".to_string(),
            }])
        }
    }

    /// Source whose backend is unreachable
    pub struct DownSource;

    #[async_trait]
    impl RepositorySource for DownSource {
        async fn list_repositories(&self) -> Result<Vec<RepositoryInfo>> {
            Err(ArchError::upstream("repository source", "connection refused"))
        }

        async fn fetch_structure(&self, _repo_id: &str) -> Result<FileTree> {
            Err(ArchError::upstream("repository source", "connection refused"))
        }

        async fn search_code(&self, _repo_id: &str, _query: &str) -> Result<Vec<CodeMatch>> {
            Err(ArchError::upstream("repository source", "connection refused"))
        }
    }

    /// Lists like `FakeSource` but never finishes fetching or searching
    pub struct StalledSource;

    #[async_trait]
    impl RepositorySource for StalledSource {
        async fn list_repositories(&self) -> Result<Vec<RepositoryInfo>> {
            FakeSource.list_repositories().await
        }

        async fn fetch_structure(&self, repo_id: &str) -> Result<FileTree> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            FakeSource.fetch_structure(repo_id).await
        }

        async fn search_code(&self, repo_id: &str, query: &str) -> Result<Vec<CodeMatch>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            FakeSource.search_code(repo_id, query).await
        }
    }

    /// Scanner that rejects every tree
    pub struct BrokenScanner;

    impl CodeScanner for BrokenScanner {
        fn analyze(&self, _repo_id: &str, _tree: &FileTree) -> Result<AnalysisResult> {
            Err(ArchError::validation("unsupported file encoding"))
        }
    }

    pub fn env() -> ToolEnv {
        ToolEnv::new(
            Arc::new(DiagramStore::new()),
            Arc::new(FakeSource),
            Arc::new(HeuristicScanner::new().unwrap()),
            TimeoutConfig::default(),
        )
    }

    /// Environment with short collaborator deadlines
    pub fn env_with(source: Arc<dyn RepositorySource>, scanner: Arc<dyn CodeScanner>) -> ToolEnv {
        let timeouts = TimeoutConfig {
            repository: Duration::from_millis(50),
            scanner: Duration::from_millis(500),
            ..TimeoutConfig::default()
        };
        ToolEnv::new(Arc::new(DiagramStore::new()), source, scanner, timeouts)
    }

    pub fn context() -> AgentContext {
        AgentContext::new(crate::types::AgentId::new("agent-1"), "tester", 10)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{context, env};
    use super::*;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "echo",
                description: "Echo a word",
                args: vec![ArgSpec::required("word", ArgType::String, "Word to echo")],
                effect: SideEffect::ReadOnly,
            }
        }

        async fn execute(
            &self,
            args: &ToolArgs,
            _ctx: &mut AgentContext,
            _env: &ToolEnv,
        ) -> Result<ToolOutput> {
            Ok(ToolOutput::new(args.str("word")?))
        }
    }

    struct Twice;

    #[async_trait]
    impl Tool for Twice {
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "twice",
                description: "Bad declaration",
                args: vec![
                    ArgSpec::required("a", ArgType::String, ""),
                    ArgSpec::optional("a", ArgType::String, ""),
                ],
                effect: SideEffect::ReadOnly,
            }
        }

        async fn execute(
            &self,
            _args: &ToolArgs,
            _ctx: &mut AgentContext,
            _env: &ToolEnv,
        ) -> Result<ToolOutput> {
            Ok(ToolOutput::new(""))
        }
    }

    #[test]
    fn test_builtin_catalog() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        assert_eq!(registry.len(), 10);
        let names: Vec<_> = registry.specs().map(|s| s.name).collect();
        assert_eq!(names[0], "list_repositories");
        assert_eq!(names[9], "highlight");
        assert_eq!(registry.schemas().as_array().unwrap().len(), 10);
    }

    #[test]
    fn test_duplicate_tool_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(Echo)).unwrap();
        let err = registry.register(Box::new(Echo)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_argument_rejected() {
        let mut registry = ToolRegistry::new();
        let err = registry.register(Box::new(Twice)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_calls() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();

        let unknown = registry.validate(&ToolCall::new("delete_everything")).unwrap_err();
        assert_eq!(unknown.kind(), ErrorKind::Schema);

        let missing = registry.validate(&ToolCall::new("analyze_repository")).unwrap_err();
        assert!(missing.to_string().contains("repo_id"));

        let wrong_type = registry
            .validate(&ToolCall::new("highlight").arg("element_ids", "el-1"))
            .unwrap_err();
        assert_eq!(wrong_type.kind(), ErrorKind::Schema);

        let bad_level = registry
            .validate(&ToolCall::new("add_element").arg("level", "galaxy").arg("name", "x"))
            .unwrap_err();
        assert!(bad_level.to_string().contains("context"));

        let extra = registry
            .validate(&ToolCall::new("drill_up").arg("force", "yes"))
            .unwrap_err();
        assert!(extra.to_string().contains("unexpected argument 'force'"));
    }

    #[test]
    fn test_optional_null_is_absent() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        let args = registry
            .validate(&ToolCall::new("search_code").arg("query", "checkout").arg("repo_id", Value::Null))
            .unwrap();
        assert_eq!(args.opt_str("repo_id"), None);
    }

    #[tokio::test]
    async fn test_bad_call_has_no_side_effect() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        let env = env();
        let mut ctx = context();

        let call = ToolCall::new("create_diagram").arg("system_name", 42);
        let result = registry.dispatch(0, &call, &mut ctx, &env).await;

        assert_eq!(result.failure_kind(), Some(ErrorKind::Schema));
        assert!(env.diagrams.is_empty());
        assert!(ctx.current_diagram.is_none());
    }

    #[tokio::test]
    async fn test_dispatch_success() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(Echo)).unwrap();
        let mut ctx = context();
        let result = registry
            .dispatch(3, &ToolCall::new("echo").arg("word", "hi"), &mut ctx, &env())
            .await;
        assert!(result.is_success());
        assert_eq!(result.index, 3);
        assert_eq!(result.output().unwrap().summary, "hi");
    }

    #[test]
    fn test_call_deserializes_without_optional_fields() {
        let call: ToolCall = serde_json::from_str(r#"{"tool": "drill_up"}"#).unwrap();
        assert!(call.args.is_empty());
        assert!(call.depends_on.is_empty());
    }

    #[test]
    fn test_spec_schema_shape() {
        let schema = Echo.spec().json_schema();
        assert_eq!(schema["name"], "echo");
        assert_eq!(schema["parameters"]["required"][0], "word");
        assert_eq!(schema["side_effect"], "read-only");
    }

    #[test]
    fn test_builtin_side_effects() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        let effects: HashMap<&str, SideEffect> =
            registry.specs().map(|s| (s.name, s.effect)).collect();

        assert_eq!(effects["search_code"], SideEffect::ReadOnly);
        assert_eq!(effects["find_code_references"], SideEffect::ReadOnly);
        assert_eq!(effects["list_repositories"], SideEffect::MutatesContext);
        assert_eq!(effects["analyze_repository"], SideEffect::MutatesContext);
        for tool in ["create_diagram", "add_element", "drill_down", "drill_up", "highlight"] {
            assert_eq!(effects[tool], SideEffect::MutatesDiagram, "{}", tool);
        }

        let schemas = registry.schemas();
        let search = schemas
            .as_array()
            .unwrap()
            .iter()
            .find(|s| s["name"] == "search_code")
            .unwrap();
        assert_eq!(search["side_effect"], "read-only");
    }
}
