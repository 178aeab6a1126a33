//! Agents
//!
//! An agent is a named conversation with its own [`AgentContext`]. Each user
//! message runs through the [`Workflow`]: a [`Planner`] turns it into tool
//! calls, the tools run against the shared diagram store and repository
//! source, and a [`Responder`] writes the answer.

pub mod context;
pub mod manager;
pub mod planner;
pub mod responder;
pub mod workflow;

pub use context::{AgentContext, AgentStatus, Exchange, SearchRecord};
pub use manager::{AgentManager, AgentSummary};
pub use planner::{LlmPlanner, Plan, Planner, RulePlanner};
pub use responder::{LlmResponder, Responder, TemplateResponder};
pub use workflow::{TraceEvent, TurnOutcome, TurnTrace, Workflow, WorkflowState};
