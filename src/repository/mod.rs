//! Repository collaborators
//!
//! - [`RepositorySource`]: lists repositories, fetches their file trees, searches code
//! - [`CodeScanner`]: turns a file tree into an [`AnalysisResult`]
//!
//! Both are traits so the workflow never depends on where code comes from.

pub mod local;
pub mod scanner;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::Result;

pub use local::LocalRepositorySource;
pub use scanner::{AnalysisResult, CodeScanner, HeuristicScanner, Symbol, SymbolKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the repository root, `/`-separated
    pub path: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTree {
    pub files: Vec<FileEntry>,
}

impl FileTree {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeMatch {
    pub repo_id: String,
    pub path: String,
    pub line: usize,
    pub snippet: String,
}

/// Where repositories come from
///
/// Implementations report unreachable backends as `Upstream` errors and
/// unknown repository ids as `NotFound`.
#[async_trait]
pub trait RepositorySource: Send + Sync {
    async fn list_repositories(&self) -> Result<Vec<RepositoryInfo>>;

    async fn fetch_structure(&self, repo_id: &str) -> Result<FileTree>;

    async fn search_code(&self, repo_id: &str, query: &str) -> Result<Vec<CodeMatch>>;
}
