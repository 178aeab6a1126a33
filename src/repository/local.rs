//! Local checkout repository source
//!
//! Every immediate subdirectory of the configured root is one repository; its
//! directory name is the repository id. Walks honour `.gitignore`, never follow
//! symlinks, and skip excluded globs and oversized files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ignore::WalkBuilder;
use tracing::debug;

use super::scanner::Language;
use super::{CodeMatch, FileEntry, FileTree, RepositoryInfo, RepositorySource};
use crate::config::RepositoriesConfig;
use crate::constants::repository::{DEFAULT_SKIP_DIRS, MAX_SEARCH_MATCHES, MAX_SNIPPET_CHARS};
use crate::types::{ArchError, Result};

#[derive(Debug, Clone)]
pub struct LocalRepositorySource {
    root: PathBuf,
    exclude: Vec<glob::Pattern>,
    max_file_size: u64,
}

impl LocalRepositorySource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let exclude = DEFAULT_SKIP_DIRS
            .iter()
            .flat_map(|d| [format!("{}/**", d), format!("**/{}/**", d)])
            .filter_map(|p| glob::Pattern::new(&p).ok())
            .collect();
        Self {
            root: root.as_ref().to_path_buf(),
            exclude,
            max_file_size: crate::constants::repository::DEFAULT_MAX_FILE_SIZE,
        }
    }

    pub fn from_config(config: &RepositoriesConfig) -> Result<Self> {
        Ok(Self::new(&config.root)
            .with_exclude(&config.exclude)?
            .with_max_file_size(config.max_file_size))
    }

    /// Add glob patterns (matched against repository-relative paths)
    pub fn with_exclude(mut self, patterns: &[String]) -> Result<Self> {
        for pattern in patterns {
            let compiled = glob::Pattern::new(pattern).map_err(|e| {
                ArchError::Config(format!("invalid exclude pattern '{}': {}", pattern, e))
            })?;
            self.exclude.push(compiled);
        }
        Ok(self)
    }

    pub fn with_max_file_size(mut self, size: u64) -> Self {
        self.max_file_size = size;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a repository id onto its checkout, rejecting anything that is not a plain child
    fn repo_path(&self, repo_id: &str) -> Result<PathBuf> {
        let valid = !repo_id.is_empty()
            && !repo_id.starts_with('.')
            && !repo_id.contains(['/', '\\'])
            && repo_id != "..";
        let path = self.root.join(repo_id);
        if !valid || !path.is_dir() {
            return Err(ArchError::not_found("repository", repo_id));
        }
        Ok(path)
    }

    fn list_blocking(&self) -> Result<Vec<RepositoryInfo>> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| {
            ArchError::upstream(
                "repository source",
                format!("cannot read '{}': {}", self.root.display(), e),
            )
        })?;

        let mut repos = Vec::new();
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(String::from) else {
                continue;
            };
            if !path.is_dir() || name.starts_with('.') {
                continue;
            }

            let url = std::fs::canonicalize(&path)
                .ok()
                .and_then(|abs| url::Url::from_directory_path(abs).ok())
                .map_or_else(|| path.display().to_string(), |u| u.to_string());

            repos.push(RepositoryInfo {
                id: name.clone(),
                name,
                url,
                default_branch: read_git_branch(&path),
                language: self.dominant_language(&path),
            });
        }
        repos.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(repos)
    }

    /// Files that pass gitignore, exclude and size filters, as (relative, absolute) paths
    fn walk(&self, repo: &Path) -> Vec<(String, PathBuf)> {
        let walker = WalkBuilder::new(repo)
            .hidden(false)
            .git_ignore(true)
            .git_global(false)
            .git_exclude(true)
            .require_git(false)
            .follow_links(false) // Security: prevent symlink traversal attacks
            .build();

        let mut files = Vec::new();
        for entry in walker.filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Ok(relative) = path.strip_prefix(repo) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");
            if self.should_exclude(&relative) || !self.check_size(path) {
                continue;
            }
            files.push((relative, path.to_path_buf()));
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        files
    }

    fn should_exclude(&self, relative: &str) -> bool {
        self.exclude.iter().any(|p| p.matches(relative))
    }

    fn check_size(&self, path: &Path) -> bool {
        path.metadata()
            .map(|m| m.len() <= self.max_file_size)
            .unwrap_or(false)
    }

    fn dominant_language(&self, repo: &Path) -> Option<String> {
        let mut counts: HashMap<Language, usize> = HashMap::new();
        for (relative, _) in self.walk(repo) {
            if let Some(lang) = Language::from_path(&relative) {
                *counts.entry(lang).or_insert(0) += 1;
            }
        }
        counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
            .map(|(lang, _)| lang.as_str().to_string())
    }

    fn fetch_blocking(&self, repo_id: &str) -> Result<FileTree> {
        let repo = self.repo_path(repo_id)?;
        let files = self
            .walk(&repo)
            .into_iter()
            // Binary and non-UTF-8 files are skipped
            .filter_map(|(path, abs)| {
                std::fs::read_to_string(&abs)
                    .ok()
                    .map(|content| FileEntry { path, content })
            })
            .collect::<Vec<_>>();
        debug!(repo = repo_id, files = files.len(), "Fetched repository structure");
        Ok(FileTree { files })
    }

    fn search_blocking(&self, repo_id: &str, query: &str) -> Result<Vec<CodeMatch>> {
        let repo = self.repo_path(repo_id)?;
        let needle = query.to_lowercase();
        let mut matches = Vec::new();

        'files: for (path, abs) in self.walk(&repo) {
            let Ok(content) = std::fs::read_to_string(&abs) else {
                continue;
            };
            for (idx, line) in content.lines().enumerate() {
                if !line.to_lowercase().contains(&needle) {
                    continue;
                }
                matches.push(CodeMatch {
                    repo_id: repo_id.to_string(),
                    path: path.clone(),
                    line: idx + 1,
                    snippet: truncate_snippet(line.trim()),
                });
                if matches.len() >= MAX_SEARCH_MATCHES {
                    break 'files;
                }
            }
        }
        Ok(matches)
    }

    async fn blocking<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(LocalRepositorySource) -> Result<T> + Send + 'static,
    {
        let this = self.clone();
        tokio::task::spawn_blocking(move || f(this))
            .await
            .map_err(|e| ArchError::upstream("repository source", format!("{} task failed: {}", op, e)))?
    }
}

#[async_trait]
impl RepositorySource for LocalRepositorySource {
    async fn list_repositories(&self) -> Result<Vec<RepositoryInfo>> {
        self.blocking("list", |src| src.list_blocking()).await
    }

    async fn fetch_structure(&self, repo_id: &str) -> Result<FileTree> {
        let repo_id = repo_id.to_string();
        self.blocking("fetch", move |src| src.fetch_blocking(&repo_id))
            .await
    }

    async fn search_code(&self, repo_id: &str, query: &str) -> Result<Vec<CodeMatch>> {
        let repo_id = repo_id.to_string();
        let query = query.to_string();
        self.blocking("search", move |src| src.search_blocking(&repo_id, &query))
            .await
    }
}

fn read_git_branch(repo: &Path) -> Option<String> {
    let head = std::fs::read_to_string(repo.join(".git").join("HEAD")).ok()?;
    head.trim()
        .strip_prefix("ref: refs/heads/")
        .map(String::from)
}

fn truncate_snippet(line: &str) -> String {
    if line.chars().count() <= MAX_SNIPPET_CHARS {
        return line.to_string();
    }
    let mut snippet: String = line.chars().take(MAX_SNIPPET_CHARS).collect();
    snippet.push('…');
    snippet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorKind;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let shop = dir.path().join("shop");
        fs::create_dir_all(shop.join("src")).unwrap();
        fs::create_dir_all(shop.join("node_modules/left-pad")).unwrap();
        fs::write(shop.join("src/app.py"), "class CartService:\n    pass\n").unwrap();
        fs::write(shop.join("src/util.py"), "def checkout():\n    return 'Cart'\n").unwrap();
        fs::write(shop.join("node_modules/left-pad/index.js"), "cart").unwrap();
        fs::create_dir_all(shop.join(".git")).unwrap();
        fs::write(shop.join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();

        fs::create_dir_all(dir.path().join("billing")).unwrap();
        fs::write(dir.path().join("billing/main.go"), "package main\n").unwrap();
        fs::create_dir_all(dir.path().join(".hidden")).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_lists_subdirectories_as_repositories() {
        let dir = fixture();
        let source = LocalRepositorySource::new(dir.path());
        let repos = source.list_repositories().await.unwrap();
        let ids: Vec<&str> = repos.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["billing", "shop"]);

        let shop = &repos[1];
        assert_eq!(shop.default_branch.as_deref(), Some("main"));
        assert_eq!(shop.language.as_deref(), Some("python"));
        assert!(shop.url.starts_with("file://"));
    }

    #[tokio::test]
    async fn test_missing_root_is_upstream() {
        let source = LocalRepositorySource::new("/definitely/not/here");
        let err = source.list_repositories().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Upstream);
    }

    #[tokio::test]
    async fn test_fetch_skips_default_excludes() {
        let dir = fixture();
        let source = LocalRepositorySource::new(dir.path());
        let tree = source.fetch_structure("shop").await.unwrap();
        let paths: Vec<&str> = tree.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["src/app.py", "src/util.py"]);
    }

    #[tokio::test]
    async fn test_unknown_or_escaping_ids_are_not_found() {
        let dir = fixture();
        let source = LocalRepositorySource::new(dir.path());
        for id in ["unknown-id", "..", "shop/src", ""] {
            let err = source.fetch_structure(id).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound, "id {:?}", id);
        }
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let dir = fixture();
        let source = LocalRepositorySource::new(dir.path());
        let matches = source.search_code("shop", "cart").await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].path, "src/app.py");
        assert_eq!(matches[0].line, 1);
        assert_eq!(matches[1].snippet, "return 'Cart'");
    }

    #[tokio::test]
    async fn test_custom_exclude_and_size_limit() {
        let dir = fixture();
        let source = LocalRepositorySource::new(dir.path())
            .with_exclude(&["src/util.py".to_string()])
            .unwrap();
        let tree = source.fetch_structure("shop").await.unwrap();
        assert_eq!(tree.len(), 1);

        let tiny = LocalRepositorySource::new(dir.path()).with_max_file_size(5);
        assert!(tiny.fetch_structure("shop").await.unwrap().is_empty());
    }
}
