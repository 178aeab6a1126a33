//! Per-agent mutable state
//!
//! Everything one agent has learned across turns: repositories it has seen,
//! the latest analysis per repository, the diagram it is working on, what it
//! searched for, and a bounded transcript.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::repository::{AnalysisResult, RepositoryInfo};
use crate::types::{AgentId, DiagramId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Busy,
    Error,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Error => "error",
        })
    }
}

/// One code search or reference lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub query: String,
    pub repo_id: Option<String>,
    pub summary: String,
    pub match_count: usize,
    pub at: DateTime<Utc>,
}

/// One completed message/response pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub message: String,
    pub response: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContext {
    pub id: AgentId,
    pub name: String,
    pub known_repositories: BTreeMap<String, RepositoryInfo>,
    /// Latest analysis per repository id
    pub analyses: BTreeMap<String, AnalysisResult>,
    pub current_diagram: Option<DiagramId>,
    /// Append-only
    pub search_history: Vec<SearchRecord>,
    transcript: VecDeque<Exchange>,
    history_limit: usize,
    pub status: AgentStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl AgentContext {
    pub fn new(id: AgentId, name: impl Into<String>, history_limit: usize) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            known_repositories: BTreeMap::new(),
            analyses: BTreeMap::new(),
            current_diagram: None,
            search_history: Vec::new(),
            transcript: VecDeque::new(),
            history_limit: history_limit.max(1),
            status: AgentStatus::Idle,
            created_at: now,
            last_activity: now,
        }
    }

    /// Replace the known repository set with a fresh listing
    pub fn set_known_repositories(&mut self, repos: Vec<RepositoryInfo>) {
        self.known_repositories = repos.into_iter().map(|r| (r.id.clone(), r)).collect();
    }

    /// Store an analysis, superseding any earlier one for the same repository
    pub fn record_analysis(&mut self, result: AnalysisResult) {
        self.analyses.insert(result.repo_id.clone(), result);
    }

    pub fn analysis(&self, repo_id: &str) -> Option<&AnalysisResult> {
        self.analyses.get(repo_id)
    }

    pub fn set_current_diagram(&mut self, id: DiagramId) {
        self.current_diagram = Some(id);
    }

    pub fn record_search(&mut self, record: SearchRecord) {
        self.search_history.push(record);
    }

    /// Append to the transcript, dropping the oldest exchanges past the limit
    pub fn record_exchange(&mut self, message: impl Into<String>, response: impl Into<String>) {
        self.transcript.push_back(Exchange {
            message: message.into(),
            response: response.into(),
            at: Utc::now(),
        });
        while self.transcript.len() > self.history_limit {
            self.transcript.pop_front();
        }
        self.touch();
    }

    pub fn transcript(&self) -> impl Iterator<Item = &Exchange> {
        self.transcript.iter()
    }

    pub fn transcript_len(&self) -> usize {
        self.transcript.len()
    }

    /// The last `n` exchanges, oldest first
    pub fn recent_exchanges(&self, n: usize) -> impl Iterator<Item = &Exchange> {
        self.transcript.iter().skip(self.transcript.len().saturating_sub(n))
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Apply a new limit, trimming the transcript if needed
    pub fn set_history_limit(&mut self, limit: usize) {
        self.history_limit = limit.max(1);
        while self.transcript.len() > self.history_limit {
            self.transcript.pop_front();
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Short state description for prompts and `agent show`
    pub fn describe(&self) -> String {
        let mut lines = Vec::new();
        if self.known_repositories.is_empty() {
            lines.push("Known repositories: none listed yet".to_string());
        } else {
            let ids: Vec<&str> = self.known_repositories.keys().map(String::as_str).collect();
            lines.push(format!("Known repositories: {}", ids.join(", ")));
        }
        for (repo, analysis) in &self.analyses {
            lines.push(format!("Analysis of {}: {}", repo, analysis.summary()));
        }
        match &self.current_diagram {
            Some(id) => lines.push(format!("Current diagram: {}", id)),
            None => lines.push("Current diagram: none".to_string()),
        }
        if let Some(last) = self.search_history.last() {
            lines.push(format!("Last search: '{}' ({})", last.query, last.summary));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::FileTree;

    fn context() -> AgentContext {
        AgentContext::new(AgentId::new("a-1"), "alice", 3)
    }

    fn repo(id: &str) -> RepositoryInfo {
        RepositoryInfo {
            id: id.to_string(),
            name: id.to_string(),
            url: format!("file:///repos/{}/", id),
            default_branch: None,
            language: None,
        }
    }

    #[test]
    fn test_transcript_is_bounded() {
        let mut ctx = context();
        for i in 0..5 {
            ctx.record_exchange(format!("q{}", i), format!("a{}", i));
        }
        assert_eq!(ctx.transcript_len(), 3);
        let first = ctx.transcript().next().unwrap();
        assert_eq!(first.message, "q2");
    }

    #[test]
    fn test_recent_exchanges_oldest_first() {
        let mut ctx = context();
        for i in 0..3 {
            ctx.record_exchange(format!("q{}", i), "a");
        }
        let recent: Vec<_> = ctx.recent_exchanges(2).map(|e| e.message.clone()).collect();
        assert_eq!(recent, vec!["q1", "q2"]);
    }

    #[test]
    fn test_shrinking_limit_trims() {
        let mut ctx = context();
        for i in 0..3 {
            ctx.record_exchange(format!("q{}", i), "a");
        }
        ctx.set_history_limit(1);
        assert_eq!(ctx.transcript_len(), 1);
    }

    #[test]
    fn test_known_repositories_replaced() {
        let mut ctx = context();
        ctx.set_known_repositories(vec![repo("shop"), repo("billing")]);
        ctx.set_known_repositories(vec![repo("shop")]);
        assert_eq!(ctx.known_repositories.len(), 1);
        assert!(ctx.known_repositories.contains_key("shop"));
    }

    #[test]
    fn test_analysis_superseded() {
        use crate::repository::{CodeScanner, FileEntry, HeuristicScanner};

        let scanner = HeuristicScanner::new().unwrap();
        let mut tree = FileTree::default();
        tree.files.push(FileEntry {
            path: "app.py".to_string(),
            content: "class OrderService:\n    pass\n".to_string(),
        });
        let first = scanner.analyze("shop", &tree).unwrap();
        tree.files.push(FileEntry {
            path: "more.py".to_string(),
            content: "def helper():\n    pass\n".to_string(),
        });
        let second = scanner.analyze("shop", &tree).unwrap();

        let mut ctx = context();
        ctx.record_analysis(first);
        ctx.record_analysis(second);
        assert_eq!(ctx.analyses.len(), 1);
        assert_eq!(ctx.analysis("shop").unwrap().file_count, 2);
    }

    #[test]
    fn test_serde_keeps_transcript() {
        let mut ctx = context();
        ctx.record_exchange("hi", "hello");
        let json = serde_json::to_string(&ctx).unwrap();
        let back: AgentContext = serde_json::from_str(&json).unwrap();
        assert_eq!(back.transcript_len(), 1);
        assert_eq!(back.history_limit(), 3);
        assert_eq!(back.id, ctx.id);
    }
}
