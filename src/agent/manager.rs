//! Agent Manager
//!
//! Owns every live agent. Each agent's context sits behind its own
//! `tokio::sync::Mutex`, which is FIFO-fair: messages for one agent are
//! processed in submission order, while different agents run in parallel and
//! share only the diagram store.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::context::{AgentContext, AgentStatus};
use super::planner::{LlmPlanner, Planner, RulePlanner};
use super::responder::{LlmResponder, Responder, TemplateResponder};
use super::workflow::{TurnOutcome, Workflow};
use crate::ai::{Inference, TimeoutConfig, create_provider};
use crate::c4::DiagramStore;
use crate::config::{AgentsConfig, Config};
use crate::repository::{HeuristicScanner, LocalRepositorySource};
use crate::storage::Database;
use crate::tools::{ToolEnv, ToolRegistry};
use crate::types::{AgentId, ArchError, Result};

/// Listing entry; readable while the agent is mid-turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub id: AgentId,
    pub name: String,
    pub status: AgentStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl AgentSummary {
    fn of(ctx: &AgentContext) -> Self {
        Self {
            id: ctx.id.clone(),
            name: ctx.name.clone(),
            status: ctx.status,
            created_at: ctx.created_at,
            last_activity: ctx.last_activity,
        }
    }
}

struct AgentSlot {
    context: tokio::sync::Mutex<AgentContext>,
    summary: Mutex<AgentSummary>,
}

impl AgentSlot {
    fn new(ctx: AgentContext) -> Arc<Self> {
        Arc::new(Self {
            summary: Mutex::new(AgentSummary::of(&ctx)),
            context: tokio::sync::Mutex::new(ctx),
        })
    }

    fn summary(&self) -> MutexGuard<'_, AgentSummary> {
        self.summary.lock().unwrap_or_else(|poisoned| {
            tracing::error!("Agent summary mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn sync_summary(&self, ctx: &AgentContext) {
        *self.summary() = AgentSummary::of(ctx);
    }

    fn set_status(&self, status: AgentStatus) {
        self.summary().status = status;
    }
}

pub struct AgentManager {
    agents: DashMap<AgentId, Arc<AgentSlot>>,
    workflow: Arc<Workflow>,
    env: ToolEnv,
    max_agents: usize,
    history_limit: usize,
    /// Serializes the name/limit check with the insert
    create_lock: Mutex<()>,
}

impl AgentManager {
    pub fn new(workflow: Arc<Workflow>, env: ToolEnv, settings: &AgentsConfig) -> Self {
        Self {
            agents: DashMap::new(),
            workflow,
            env,
            max_agents: settings.max_agents,
            history_limit: settings.history_limit,
            create_lock: Mutex::new(()),
        }
    }

    /// Assemble the manager and its collaborators from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeouts = TimeoutConfig::from_config(config);
        let env = ToolEnv::new(
            Arc::new(DiagramStore::new()),
            Arc::new(LocalRepositorySource::from_config(&config.repositories)?),
            Arc::new(HeuristicScanner::new()?),
            timeouts.clone(),
        );

        let (planner, responder): (Arc<dyn Planner>, Arc<dyn Responder>) =
            match create_provider(&config.llm)? {
                Some(provider) => {
                    let inference = Inference::new(provider, timeouts.inference);
                    (
                        Arc::new(LlmPlanner::new(inference.clone())) as Arc<dyn Planner>,
                        Arc::new(LlmResponder::new(inference)) as Arc<dyn Responder>,
                    )
                }
                None => (
                    Arc::new(RulePlanner::new()?) as Arc<dyn Planner>,
                    Arc::new(TemplateResponder) as Arc<dyn Responder>,
                ),
            };

        let workflow = Workflow::new(
            Arc::new(ToolRegistry::with_builtin_tools()?),
            planner,
            responder,
        );
        info!(
            planner = workflow.planner_name(),
            responder = workflow.responder_name(),
            "Agent manager ready"
        );
        Ok(Self::new(Arc::new(workflow), env, &config.agents))
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn diagrams(&self) -> &DiagramStore {
        &self.env.diagrams
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn max_agents(&self) -> usize {
        self.max_agents
    }

    fn lock_create(&self) -> MutexGuard<'_, ()> {
        self.create_lock.lock().unwrap_or_else(|poisoned| {
            tracing::error!("Agent creation mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn slot(&self, id: &AgentId) -> Result<Arc<AgentSlot>> {
        self.agents
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ArchError::not_found("agent", id.as_str()))
    }

    pub fn create_agent(&self, name: &str) -> Result<AgentId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ArchError::validation("agent name must not be empty"));
        }

        let _guard = self.lock_create();
        if self.find_by_name(name).is_some() {
            return Err(ArchError::conflict(format!(
                "an agent named '{}' already exists",
                name
            )));
        }
        if self.agents.len() >= self.max_agents {
            return Err(ArchError::conflict(format!(
                "agent limit reached ({} agents)",
                self.max_agents
            )));
        }

        let id = AgentId::generate();
        let ctx = AgentContext::new(id.clone(), name, self.history_limit);
        self.agents.insert(id.clone(), AgentSlot::new(ctx));
        info!(agent = %id, name, "Created agent");
        Ok(id)
    }

    /// Remove an agent. Unknown ids are ignored; its diagrams stay in the store.
    pub fn delete_agent(&self, id: &AgentId) {
        if self.agents.remove(id).is_some() {
            info!(agent = %id, "Deleted agent");
        } else {
            debug!(agent = %id, "Delete of unknown agent ignored");
        }
    }

    /// Snapshot of an agent's context; waits for an in-flight turn.
    pub async fn get_context(&self, id: &AgentId) -> Result<AgentContext> {
        let slot = self.slot(id)?;
        let ctx = slot.context.lock().await;
        Ok(ctx.clone())
    }

    pub fn find_by_name(&self, name: &str) -> Option<AgentId> {
        let name = name.trim();
        self.agents
            .iter()
            .find(|entry| entry.value().summary().name == name)
            .map(|entry| entry.key().clone())
    }

    /// Agents ordered by creation time
    pub fn list_agents(&self) -> Vec<AgentSummary> {
        let mut summaries: Vec<AgentSummary> = self
            .agents
            .iter()
            .map(|entry| entry.value().summary().clone())
            .collect();
        summaries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        summaries
    }

    /// Run one turn for an agent. Queues behind any turn already in flight.
    #[instrument(skip(self, message), fields(agent = %id))]
    pub async fn process_message(&self, id: &AgentId, message: &str) -> Result<TurnOutcome> {
        let slot = self.slot(id)?;
        let mut ctx = slot.context.lock().await;

        slot.set_status(AgentStatus::Busy);

        let outcome = self.workflow.run_turn(message, &mut ctx, &self.env).await;

        if outcome.is_success() {
            ctx.status = AgentStatus::Idle;
            slot.sync_summary(&ctx);
        } else {
            // A rejected request leaves the context untouched; only the roster records it
            slot.set_status(AgentStatus::Error);
        }
        Ok(outcome)
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Write every diagram and agent to the database, replacing what was there.
    pub async fn persist(&self, db: &Database) -> Result<()> {
        let slots: Vec<Arc<AgentSlot>> = self
            .agents
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut contexts = Vec::with_capacity(slots.len());
        for slot in slots {
            contexts.push(slot.context.lock().await.clone());
        }
        contexts.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        db.replace_state(&self.env.diagrams.snapshots(), &contexts)
    }

    /// Load diagrams and agents saved by [`persist`](Self::persist).
    ///
    /// Records that clash with something already loaded are skipped.
    pub fn restore(&self, db: &Database) -> Result<(usize, usize)> {
        let state = db.load_state()?;

        let mut diagrams = 0;
        for diagram in state.diagrams {
            let id = diagram.id.clone();
            match self.env.diagrams.restore(diagram) {
                Ok(()) => diagrams += 1,
                Err(e) => warn!(diagram = %id, error = %e, "Skipping stored diagram"),
            }
        }

        let _guard = self.lock_create();
        let mut agents = 0;
        for mut ctx in state.agents {
            if self.agents.contains_key(&ctx.id) || self.find_by_name(&ctx.name).is_some() {
                warn!(agent = %ctx.id, name = %ctx.name, "Skipping stored agent, already loaded");
                continue;
            }
            ctx.set_history_limit(self.history_limit);
            ctx.status = AgentStatus::Idle;
            self.agents.insert(ctx.id.clone(), AgentSlot::new(ctx));
            agents += 1;
        }

        if self.agents.len() > self.max_agents {
            warn!(
                agents = self.agents.len(),
                limit = self.max_agents,
                "More stored agents than the configured limit"
            );
        }
        info!(diagrams, agents, "Restored state");
        Ok((diagrams, agents))
    }
}
