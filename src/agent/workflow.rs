//! Orchestration Workflow
//!
//! One user message runs through three states:
//!
//! ```text
//! AnalyzeRequest ──> ExecuteTools ──> GenerateResponse
//!       │
//!       └── failure: typed failure response, context untouched
//! ```
//!
//! Tool execution is sequential and fail-soft: every planned call yields
//! exactly one [`ToolResult`]. A call whose `depends_on` names a failed
//! call is skipped with an `InvalidState` result. Everything that happens is
//! appended to a [`TurnTrace`].

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::context::AgentContext;
use super::planner::{Plan, Planner};
use super::responder::Responder;
use crate::c4::DiagramView;
use crate::tools::{ToolCall, ToolEnv, ToolRegistry, ToolResult};
use crate::types::{AgentId, ArchError, ErrorReport, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    AnalyzeRequest,
    ExecuteTools,
    GenerateResponse,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AnalyzeRequest => "AnalyzeRequest",
            Self::ExecuteTools => "ExecuteTools",
            Self::GenerateResponse => "GenerateResponse",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    Entered {
        state: WorkflowState,
        at: DateTime<Utc>,
    },
    Planned {
        planner: String,
        calls: Vec<ToolCall>,
    },
    Invoked {
        index: usize,
        call: ToolCall,
    },
    Completed {
        result: ToolResult,
    },
    Failed {
        state: WorkflowState,
        error: ErrorReport,
    },
}

/// Replayable record of one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnTrace {
    pub turn_id: String,
    pub agent_id: AgentId,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub events: Vec<TraceEvent>,
}

impl TurnTrace {
    pub fn new(agent_id: AgentId, message: impl Into<String>) -> Self {
        Self {
            turn_id: uuid::Uuid::new_v4().to_string(),
            agent_id,
            message: message.into(),
            started_at: Utc::now(),
            finished_at: None,
            events: Vec::new(),
        }
    }

    fn enter(&mut self, state: WorkflowState) {
        debug!(turn = %self.turn_id, %state, "Workflow transition");
        self.events.push(TraceEvent::Entered {
            state,
            at: Utc::now(),
        });
    }

    fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// States entered, in order
    pub fn states(&self) -> Vec<WorkflowState> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TraceEvent::Entered { state, .. } => Some(*state),
                _ => None,
            })
            .collect()
    }

    pub fn planned_calls(&self) -> &[ToolCall] {
        self.events
            .iter()
            .find_map(|e| match e {
                TraceEvent::Planned { calls, .. } => Some(calls.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn results(&self) -> Vec<&ToolResult> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TraceEvent::Completed { result } => Some(result),
                _ => None,
            })
            .collect()
    }
}

/// Everything a turn produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub response: String,
    /// Latest diagram view produced during the turn
    pub view: Option<DiagramView>,
    pub results: Vec<ToolResult>,
    /// Set when the turn failed before tools could run
    pub error: Option<ErrorReport>,
    pub trace: TurnTrace,
}

impl TurnOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub struct Workflow {
    registry: Arc<ToolRegistry>,
    planner: Arc<dyn Planner>,
    responder: Arc<dyn Responder>,
}

impl Workflow {
    pub fn new(
        registry: Arc<ToolRegistry>,
        planner: Arc<dyn Planner>,
        responder: Arc<dyn Responder>,
    ) -> Self {
        Self {
            registry,
            planner,
            responder,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn planner_name(&self) -> &str {
        self.planner.name()
    }

    pub fn responder_name(&self) -> &str {
        self.responder.name()
    }

    /// Decide which tools to run. Reads the context, never writes it.
    pub async fn analyze_request(&self, message: &str, ctx: &AgentContext) -> Result<Plan> {
        if message.trim().is_empty() {
            return Err(ArchError::validation("message must not be empty"));
        }
        self.planner.plan(message, ctx, &self.registry).await
    }

    /// Run calls in order; one result per call, failures included.
    pub async fn execute_tools(
        &self,
        calls: &[ToolCall],
        ctx: &mut AgentContext,
        env: &ToolEnv,
        trace: &mut TurnTrace,
    ) -> Vec<ToolResult> {
        let mut results: Vec<ToolResult> = Vec::with_capacity(calls.len());

        for (index, call) in calls.iter().enumerate() {
            trace.events.push(TraceEvent::Invoked {
                index,
                call: call.clone(),
            });

            let result = match unmet_dependency(index, call, &results) {
                Some(reason) => {
                    warn!(index, tool = %call.tool, %reason, "Skipping tool call");
                    ToolResult::failed(index, &call.tool, &ArchError::invalid_state(reason))
                }
                None => self.registry.dispatch(index, call, ctx, env).await,
            };

            trace.events.push(TraceEvent::Completed {
                result: result.clone(),
            });
            results.push(result);
        }
        results
    }

    /// Compose the answer and pick the view to show.
    pub async fn generate_response(
        &self,
        message: &str,
        ctx: &AgentContext,
        planned_answer: Option<&str>,
        results: &[ToolResult],
    ) -> (String, Option<DiagramView>) {
        let response = self
            .responder
            .respond(message, ctx, planned_answer, results)
            .await;
        let view = results
            .iter()
            .rev()
            .find_map(|r| r.output().and_then(|o| o.view.clone()));
        (response, view)
    }

    /// Run one full turn. Never returns an error: failures are in the outcome.
    #[instrument(skip_all, fields(agent = %ctx.id, planner = self.planner.name()))]
    pub async fn run_turn(
        &self,
        message: &str,
        ctx: &mut AgentContext,
        env: &ToolEnv,
    ) -> TurnOutcome {
        let mut trace = TurnTrace::new(ctx.id.clone(), message);

        trace.enter(WorkflowState::AnalyzeRequest);
        let plan = match self.analyze_request(message, ctx).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "AnalyzeRequest failed");
                let error = ErrorReport::from(&e);
                trace.events.push(TraceEvent::Failed {
                    state: WorkflowState::AnalyzeRequest,
                    error: error.clone(),
                });
                trace.finish();
                return TurnOutcome {
                    response: format!("I could not process that request. {}", error),
                    view: None,
                    results: Vec::new(),
                    error: Some(error),
                    trace,
                };
            }
        };
        trace.events.push(TraceEvent::Planned {
            planner: self.planner.name().to_string(),
            calls: plan.calls.clone(),
        });

        trace.enter(WorkflowState::ExecuteTools);
        let results = self.execute_tools(&plan.calls, ctx, env, &mut trace).await;

        trace.enter(WorkflowState::GenerateResponse);
        let (response, view) = self
            .generate_response(message, ctx, plan.answer.as_deref(), &results)
            .await;

        ctx.record_exchange(message, response.clone());
        trace.finish();

        info!(
            calls = results.len(),
            failed = results.iter().filter(|r| !r.is_success()).count(),
            "Turn completed"
        );

        TurnOutcome {
            response,
            view,
            results,
            error: None,
            trace,
        }
    }
}

/// Why `call` cannot run given the results so far, if it cannot
fn unmet_dependency(index: usize, call: &ToolCall, results: &[ToolResult]) -> Option<String> {
    call.depends_on.iter().find_map(|&dep| {
        if dep >= index {
            return Some(format!(
                "skipped: call {} depends on call {} which has not run",
                index, dep
            ));
        }
        results
            .get(dep)
            .filter(|r| !r.is_success())
            .map(|r| format!("skipped: depends on failed call {} ({})", dep, r.tool))
    })
}
