//! Repository tools: listing, analysis, code search, symbol lookup

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use super::{ArgSpec, ArgType, SideEffect, Tool, ToolArgs, ToolEnv, ToolOutput, ToolSpec};
use crate::agent::{AgentContext, SearchRecord};
use crate::ai::with_timeout;
use crate::repository::{CodeMatch, Symbol};
use crate::types::{ArchError, ErrorKind, Result};

/// Lists repositories from the source and replaces the agent's known set
pub struct ListRepositories;

#[async_trait]
impl Tool for ListRepositories {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "list_repositories",
            description: "List the code repositories available for analysis",
            args: vec![],
            effect: SideEffect::MutatesContext,
        }
    }

    async fn execute(
        &self,
        _args: &ToolArgs,
        ctx: &mut AgentContext,
        env: &ToolEnv,
    ) -> Result<ToolOutput> {
        let repos = with_timeout(
            env.timeouts.repository,
            env.source.list_repositories(),
            "list_repositories",
        )
        .await?;

        let summary = if repos.is_empty() {
            "No repositories found".to_string()
        } else {
            let names: Vec<&str> = repos.iter().map(|r| r.id.as_str()).collect();
            format!("Found {} repositories: {}", repos.len(), names.join(", "))
        };
        let data = serde_json::to_value(&repos)?;
        ctx.set_known_repositories(repos);

        Ok(ToolOutput::new(summary).with_data(data))
    }
}

/// Fetches a repository's files and scans them; stores the result on the context
pub struct AnalyzeRepository;

#[async_trait]
impl Tool for AnalyzeRepository {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "analyze_repository",
            description: "Analyze a repository's structure: endpoints, classes, services, dependencies",
            args: vec![ArgSpec::required(
                "repo_id",
                ArgType::String,
                "Repository id from list_repositories",
            )],
            effect: SideEffect::MutatesContext,
        }
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        ctx: &mut AgentContext,
        env: &ToolEnv,
    ) -> Result<ToolOutput> {
        let repo_id = args.str("repo_id")?.trim().to_string();
        if repo_id.is_empty() {
            return Err(ArchError::validation("repo_id must not be empty"));
        }

        let tree = with_timeout(
            env.timeouts.repository,
            env.source.fetch_structure(&repo_id),
            "fetch_structure",
        )
        .await?;

        let scanner = Arc::clone(&env.scanner);
        let id = repo_id.clone();
        let result = with_timeout(
            env.timeouts.scanner,
            async move {
                tokio::task::spawn_blocking(move || scanner.analyze(&id, &tree))
                    .await
                    .map_err(|e| ArchError::upstream("scanner", format!("task failed: {}", e)))?
            },
            "analyze_repository",
        )
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::Upstream => e,
            _ => ArchError::upstream("scanner", e.to_string()),
        })?;

        let summary = format!("Analyzed {}: {}", repo_id, result.summary());
        let data = json!({
            "repo_id": result.repo_id,
            "file_count": result.file_count,
            "languages": result.languages,
            "endpoints": result.endpoints,
            "services": result.services,
            "classes": result.classes.len(),
            "functions": result.functions.len(),
            "dependencies": result.dependencies,
            "fingerprint": result.fingerprint,
        });
        ctx.record_analysis(result);

        Ok(ToolOutput::new(summary).with_data(data))
    }
}

/// Text search in one repository, or every known repository
pub struct SearchCode;

#[async_trait]
impl Tool for SearchCode {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "search_code",
            description: "Search source code for a string; all known repositories unless repo_id is given",
            args: vec![
                ArgSpec::required("query", ArgType::String, "Text to search for"),
                ArgSpec::optional("repo_id", ArgType::String, "Restrict to one repository"),
            ],
            effect: SideEffect::ReadOnly,
        }
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        ctx: &mut AgentContext,
        env: &ToolEnv,
    ) -> Result<ToolOutput> {
        let query = args.str("query")?.trim().to_string();
        if query.is_empty() {
            return Err(ArchError::validation("search query must not be empty"));
        }
        let repo_id = args
            .opt_str("repo_id")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let targets: Vec<String> = match &repo_id {
            Some(id) => vec![id.clone()],
            None if !ctx.known_repositories.is_empty() => {
                ctx.known_repositories.keys().cloned().collect()
            }
            None => with_timeout(
                env.timeouts.repository,
                env.source.list_repositories(),
                "list_repositories",
            )
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect(),
        };

        let mut matches: Vec<CodeMatch> = Vec::new();
        for target in &targets {
            let found = with_timeout(
                env.timeouts.repository,
                env.source.search_code(target, &query),
                "search_code",
            )
            .await?;
            matches.extend(found);
        }

        let summary = if matches.is_empty() {
            format!("No matches for '{}'", query)
        } else {
            format!(
                "{} matches for '{}' in {} repositories",
                matches.len(),
                query,
                targets.len()
            )
        };
        ctx.record_search(SearchRecord {
            query,
            repo_id,
            summary: summary.clone(),
            match_count: matches.len(),
            at: Utc::now(),
        });

        Ok(ToolOutput::new(summary).with_data(serde_json::to_value(&matches)?))
    }
}

/// Symbol lookup across the agent's stored analyses
pub struct FindCodeReferences;

#[async_trait]
impl Tool for FindCodeReferences {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "find_code_references",
            description: "Find classes, functions and endpoints whose names contain a term, across analyzed repositories",
            args: vec![ArgSpec::required("term", ArgType::String, "Symbol name fragment")],
            effect: SideEffect::ReadOnly,
        }
    }

    async fn execute(
        &self,
        args: &ToolArgs,
        ctx: &mut AgentContext,
        _env: &ToolEnv,
    ) -> Result<ToolOutput> {
        let term = args.str("term")?.trim().to_string();
        if term.is_empty() {
            return Err(ArchError::validation("search term must not be empty"));
        }

        let references: Vec<(String, Symbol)> = ctx
            .analyses
            .iter()
            .flat_map(|(repo, analysis)| {
                analysis
                    .references(&term)
                    .into_iter()
                    .map(move |symbol| (repo.clone(), symbol))
            })
            .collect();

        let summary = if ctx.analyses.is_empty() {
            format!(
                "No analyzed repositories to search for '{}'; run analyze_repository first",
                term
            )
        } else {
            format!(
                "{} references to '{}' across {} analyzed repositories",
                references.len(),
                term,
                ctx.analyses.len()
            )
        };

        let data: Vec<_> = references
            .iter()
            .map(|(repo, s)| {
                json!({
                    "repo_id": repo,
                    "name": s.name,
                    "kind": s.kind,
                    "path": s.path,
                    "line": s.line,
                })
            })
            .collect();

        ctx.record_search(SearchRecord {
            query: term,
            repo_id: None,
            summary: summary.clone(),
            match_count: references.len(),
            at: Utc::now(),
        });

        Ok(ToolOutput::new(summary).with_data(json!(data)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::test_support::{
        BrokenScanner, DownSource, FakeSource, StalledSource, context, env, env_with,
    };
    use super::super::{ToolCall, ToolRegistry};
    use crate::repository::HeuristicScanner;
    use crate::types::ErrorKind;

    #[tokio::test]
    async fn test_list_populates_known_repositories() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        let mut ctx = context();
        let result = registry
            .dispatch(0, &ToolCall::new("list_repositories"), &mut ctx, &env())
            .await;
        assert!(result.is_success());
        assert!(ctx.known_repositories.contains_key("shop"));
    }

    #[tokio::test]
    async fn test_analyze_unknown_repository_leaves_context() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        let env = env();
        let mut ctx = context();
        registry
            .dispatch(0, &ToolCall::new("list_repositories"), &mut ctx, &env)
            .await;
        let before = ctx.known_repositories.clone();

        let call = ToolCall::new("analyze_repository").arg("repo_id", "unknown-id");
        let result = registry.dispatch(1, &call, &mut ctx, &env).await;

        assert_eq!(result.failure_kind(), Some(ErrorKind::NotFound));
        assert_eq!(ctx.known_repositories, before);
        assert!(ctx.analyses.is_empty());
    }

    #[tokio::test]
    async fn test_analyze_records_result() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        let mut ctx = context();
        let call = ToolCall::new("analyze_repository").arg("repo_id", "shop");
        let result = registry.dispatch(0, &call, &mut ctx, &env()).await;

        assert!(result.is_success(), "{:?}", result.failure());
        let analysis = ctx.analysis("shop").unwrap();
        assert_eq!(analysis.services.len(), 1);
        assert_eq!(analysis.services[0].name, "OrderService");
    }

    #[tokio::test]
    async fn test_search_empty_query_is_validation() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        let mut ctx = context();
        let call = ToolCall::new("search_code").arg("query", "   ");
        let result = registry.dispatch(0, &call, &mut ctx, &env()).await;
        assert_eq!(result.failure_kind(), Some(ErrorKind::Validation));
        assert!(ctx.search_history.is_empty());
    }

    #[tokio::test]
    async fn test_search_without_match_is_success() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        let mut ctx = context();
        let call = ToolCall::new("search_code").arg("query", "kafka");
        let result = registry.dispatch(0, &call, &mut ctx, &env()).await;

        assert!(result.is_success());
        assert_eq!(ctx.search_history.len(), 1);
        assert_eq!(ctx.search_history[0].match_count, 0);
    }

    #[tokio::test]
    async fn test_search_records_history() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        let mut ctx = context();
        let call = ToolCall::new("search_code")
            .arg("query", "checkout")
            .arg("repo_id", "shop");
        let result = registry.dispatch(0, &call, &mut ctx, &env()).await;

        assert!(result.is_success());
        let record = &ctx.search_history[0];
        assert_eq!(record.repo_id.as_deref(), Some("shop"));
        assert_eq!(record.match_count, 1);
    }

    #[tokio::test]
    async fn test_references_over_analyses() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        let env = env();
        let mut ctx = context();
        registry
            .dispatch(
                0,
                &ToolCall::new("analyze_repository").arg("repo_id", "shop"),
                &mut ctx,
                &env,
            )
            .await;

        let call = ToolCall::new("find_code_references").arg("term", "order");
        let result = registry.dispatch(1, &call, &mut ctx, &env).await;

        let output = result.output().unwrap();
        assert_eq!(output.data[0]["name"], "OrderService");
        assert_eq!(ctx.search_history.len(), 1);
    }

    #[tokio::test]
    async fn test_references_empty_term() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        let mut ctx = context();
        let call = ToolCall::new("find_code_references").arg("term", "");
        let result = registry.dispatch(0, &call, &mut ctx, &env()).await;
        assert_eq!(result.failure_kind(), Some(ErrorKind::Validation));
    }

    #[tokio::test]
    async fn test_list_unreachable_source_keeps_known_repositories() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        let mut ctx = context();
        registry
            .dispatch(0, &ToolCall::new("list_repositories"), &mut ctx, &env())
            .await;
        let before = ctx.known_repositories.clone();

        let down = env_with(Arc::new(DownSource), Arc::new(HeuristicScanner::new().unwrap()));
        let result = registry
            .dispatch(1, &ToolCall::new("list_repositories"), &mut ctx, &down)
            .await;

        assert_eq!(result.failure_kind(), Some(ErrorKind::Upstream));
        assert!(result.failure().unwrap().message.contains("connection refused"));
        assert_eq!(ctx.known_repositories, before);
    }

    #[tokio::test]
    async fn test_analyze_fetch_timeout_is_upstream() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        let stalled = env_with(Arc::new(StalledSource), Arc::new(HeuristicScanner::new().unwrap()));
        let mut ctx = context();
        registry
            .dispatch(0, &ToolCall::new("list_repositories"), &mut ctx, &stalled)
            .await;
        let before = ctx.known_repositories.clone();
        assert_eq!(before.len(), 1);

        let call = ToolCall::new("analyze_repository").arg("repo_id", "shop");
        let result = registry.dispatch(1, &call, &mut ctx, &stalled).await;

        assert_eq!(result.failure_kind(), Some(ErrorKind::Upstream));
        assert!(result.failure().unwrap().message.contains("fetch_structure"));
        assert_eq!(ctx.known_repositories, before);
        assert!(ctx.analyses.is_empty());
    }

    #[tokio::test]
    async fn test_analyze_scanner_failure_is_upstream() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        let broken = env_with(Arc::new(FakeSource), Arc::new(BrokenScanner));
        let mut ctx = context();

        let call = ToolCall::new("analyze_repository").arg("repo_id", "shop");
        let result = registry.dispatch(0, &call, &mut ctx, &broken).await;

        // Scanner errors are reported as the collaborator's, whatever their own kind
        assert_eq!(result.failure_kind(), Some(ErrorKind::Upstream));
        assert!(ctx.analyses.is_empty());
    }

    #[tokio::test]
    async fn test_search_timeout_records_nothing() {
        let registry = ToolRegistry::with_builtin_tools().unwrap();
        let stalled = env_with(Arc::new(StalledSource), Arc::new(HeuristicScanner::new().unwrap()));
        let mut ctx = context();

        let call = ToolCall::new("search_code").arg("query", "checkout").arg("repo_id", "shop");
        let result = registry.dispatch(0, &call, &mut ctx, &stalled).await;

        assert_eq!(result.failure_kind(), Some(ErrorKind::Upstream));
        assert!(ctx.search_history.is_empty());
    }
}
