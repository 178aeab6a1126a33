//! archlens - Conversational Architecture Assistant
//!
//! Agents answer questions about a set of source repositories and build C4
//! architecture diagrams (Context, Container, Component, Code) collaboratively.
//!
//! ## Core Features
//!
//! - **Orchestration Workflow**: AnalyzeRequest → ExecuteTools → GenerateResponse,
//!   fail-soft, with a replayable trace per turn
//! - **Tool Registry**: ten schema-checked tools over repositories and diagrams
//! - **C4 Diagram Store**: forest-shaped hierarchy with navigation and highlights
//! - **Agent Manager**: many agents, one message at a time per agent
//! - **Persistence**: SQLite snapshot of agents and diagrams
//!
//! ## Quick Start
//!
//! ```ignore
//! use archlens::{AgentManager, ConfigLoader};
//!
//! let config = ConfigLoader::load()?;
//! let manager = AgentManager::from_config(&config)?;
//! let agent = manager.create_agent("architect")?;
//! let outcome = manager.process_message(&agent, "show architecture").await?;
//! println!("{}", outcome.response);
//! ```
//!
//! ## Modules
//!
//! - [`agent`]: agent contexts, planners, responders, workflow and manager
//! - [`tools`]: tool trait, registry and the built-in tools
//! - [`c4`]: diagram model, store and exports
//! - [`repository`]: repository source and code scanner
//! - [`ai`]: inference providers and model-output parsing
//! - [`storage`]: SQLite persistence with connection pooling
//! - [`config`]: layered configuration

pub mod agent;
pub mod ai;
pub mod c4;
pub mod cli;
pub mod config;
pub mod constants;
pub mod repository;
pub mod storage;
pub mod tools;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

pub use config::{Config, ConfigLoader};
pub use types::{AgentId, ArchError, DiagramId, ErrorKind, ErrorReport, Result, ResultExt};

pub use storage::database::PoolConfig;
pub use storage::{Database, SharedDatabase};

// =============================================================================
// Agent Re-exports
// =============================================================================

pub use agent::{
    AgentContext, AgentManager, AgentStatus, AgentSummary, Planner, Responder, RulePlanner,
    TemplateResponder, TurnOutcome, TurnTrace, Workflow, WorkflowState,
};

// =============================================================================
// Tool and Diagram Re-exports
// =============================================================================

pub use c4::{C4Diagram, C4Level, DiagramStore, DiagramView, ExportFormat, NewElement};
pub use tools::{Tool, ToolCall, ToolEnv, ToolRegistry, ToolResult};

// =============================================================================
// Collaborator Re-exports
// =============================================================================

pub use ai::{Inference, LlmProvider, LlmResponse, TimeoutConfig, with_timeout};
pub use repository::{CodeScanner, HeuristicScanner, LocalRepositorySource, RepositorySource};
