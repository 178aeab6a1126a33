//! Heuristic Code Scanner
//!
//! Line-oriented regex extraction of classes, functions, imports and
//! route-bound endpoints for Python, JavaScript/TypeScript, Java, Go and Rust,
//! plus declared dependencies from common manifest files.
//!
//! Output is deterministic for identical input: files are processed in path
//! order and the fingerprint is a SHA-256 over every path and content.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{FileEntry, FileTree};
use crate::constants::analysis::{MAX_REFERENCES, SERVICE_INDICATORS};
use crate::types::{ArchError, Result};

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    TypeScript,
    Java,
    Go,
    Rust,
}

impl Language {
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = Path::new(path).extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "py" => Some(Self::Python),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "ts" | "tsx" => Some(Self::TypeScript),
            "java" => Some(Self::Java),
            "go" => Some(Self::Go),
            "rs" => Some(Self::Rust),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Java => "java",
            Self::Go => "go",
            Self::Rust => "rust",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Class,
    Struct,
    Interface,
    Function,
    Endpoint,
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Class => "class",
            Self::Struct => "struct",
            Self::Interface => "interface",
            Self::Function => "function",
            Self::Endpoint => "endpoint",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub path: String,
    pub line: usize,
}

/// Facts extracted from one repository. Superseded, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub repo_id: String,
    pub endpoints: Vec<Symbol>,
    /// Classes, structs and interfaces
    pub classes: Vec<Symbol>,
    /// Classes whose names look like services
    pub services: Vec<Symbol>,
    pub functions: Vec<Symbol>,
    /// Imports and manifest dependencies, sorted and deduplicated
    pub dependencies: Vec<String>,
    pub file_count: usize,
    pub languages: BTreeMap<String, usize>,
    pub fingerprint: String,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisResult {
    /// Symbols whose name contains `term` (case-insensitive)
    pub fn references(&self, term: &str) -> Vec<Symbol> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.classes
            .iter()
            .chain(&self.functions)
            .chain(&self.endpoints)
            .filter(|s| s.name.to_lowercase().contains(&needle))
            .take(MAX_REFERENCES)
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> String {
        let languages = if self.languages.is_empty() {
            "no recognised source".to_string()
        } else {
            self.languages
                .iter()
                .map(|(lang, count)| format!("{} {}", lang, count))
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "{} files ({}); {} endpoints, {} classes, {} services, {} dependencies",
            self.file_count,
            languages,
            self.endpoints.len(),
            self.classes.len(),
            self.services.len(),
            self.dependencies.len()
        )
    }
}

/// Turns a file tree into an [`AnalysisResult`]
pub trait CodeScanner: Send + Sync {
    fn analyze(&self, repo_id: &str, tree: &FileTree) -> Result<AnalysisResult>;
}

// =============================================================================
// Heuristic Scanner
// =============================================================================

struct LanguageRules {
    symbols: Vec<(Regex, SymbolKind)>,
    imports: Vec<Regex>,
    /// Named groups `method` (optional) and `path`
    endpoints: Vec<Regex>,
}

pub struct HeuristicScanner {
    rules: HashMap<Language, LanguageRules>,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| ArchError::Config(format!("invalid scanner pattern '{}': {}", pattern, e)))
}

fn rules(
    symbols: &[(&str, SymbolKind)],
    imports: &[&str],
    endpoints: &[&str],
) -> Result<LanguageRules> {
    Ok(LanguageRules {
        symbols: symbols
            .iter()
            .map(|(p, kind)| -> Result<(Regex, SymbolKind)> { Ok((compile(p)?, *kind)) })
            .collect::<Result<_>>()?,
        imports: imports.iter().map(|p| compile(p)).collect::<Result<_>>()?,
        endpoints: endpoints.iter().map(|p| compile(p)).collect::<Result<_>>()?,
    })
}

impl HeuristicScanner {
    pub fn new() -> Result<Self> {
        use SymbolKind::*;

        let mut table = HashMap::new();
        table.insert(
            Language::Python,
            rules(
                &[
                    (r"^\s*class\s+([A-Za-z_]\w*)", Class),
                    (r"^\s*(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(", Function),
                ],
                &[
                    r"^\s*from\s+([\w.]+)\s+import\b",
                    r"^\s*import\s+([\w.]+)",
                ],
                &[
                    r#"^\s*@\s*[\w.]*?\.(?P<method>route|get|post|put|delete|patch|api_route)\s*\(\s*['"](?P<path>[^'"]*)['"]"#,
                ],
            )?,
        );

        let js = || {
            rules(
                &[
                    (r"(?:^|[\s;])(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)", Class),
                    (r"(?:^|[\s;])(?:export\s+)?interface\s+([A-Za-z_$][\w$]*)", Interface),
                    (r"(?:^|[\s;])(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)\s*[<(]", Function),
                    (r"(?:^|[\s;])(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s*)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*=>", Function),
                ],
                &[
                    r#"^\s*import\s+(?:[^'"]*?\s+from\s+)?['"]([^'"]+)['"]"#,
                    r#"require\(\s*['"]([^'"]+)['"]\s*\)"#,
                ],
                &[
                    r#"\b(?:app|router|server)\.(?P<method>get|post|put|delete|patch|all)\s*\(\s*['"`](?P<path>[^'"`]+)['"`]"#,
                    r#"@(?P<method>Get|Post|Put|Delete|Patch)\(\s*['"]?(?P<path>[^'")]*)['"]?\s*\)"#,
                ],
            )
        };
        table.insert(Language::JavaScript, js()?);
        table.insert(Language::TypeScript, js()?);

        table.insert(
            Language::Java,
            rules(
                &[
                    (r"(?:public|private|protected)?\s*(?:static\s+)?(?:final\s+)?(?:abstract\s+)?class\s+([A-Za-z_]\w*)", Class),
                    (r"(?:public|private|protected)?\s*interface\s+([A-Za-z_]\w*)", Interface),
                    (r"^\s*(?:public|private|protected)\s+(?:static\s+)?(?:final\s+)?(?:synchronized\s+)?(?:<[^>]+>\s+)?[\w<>\[\],.?]+\s+([a-z_]\w*)\s*\(", Function),
                ],
                &[r"^\s*import\s+(?:static\s+)?([\w.]+)\s*;"],
                &[
                    r#"@(?P<method>Get|Post|Put|Delete|Patch|Request)Mapping\s*\(\s*(?:(?:value|path)\s*=\s*)?"(?P<path>[^"]*)""#,
                ],
            )?,
        );

        table.insert(
            Language::Go,
            rules(
                &[
                    (r"^type\s+([A-Za-z_]\w*)\s+struct\b", Struct),
                    (r"^type\s+([A-Za-z_]\w*)\s+interface\b", Interface),
                    (r"^func\s+(?:\([^)]*\)\s*)?([A-Za-z_]\w*)\s*[\[(]", Function),
                ],
                // Single imports and the members of an import block
                &[r#"^\s*(?:import\s+)?(?:[\w.]+\s+)?"([^"\s]+)"\s*$"#],
                &[
                    r#"\.(?P<method>HandleFunc|Handle|GET|POST|PUT|DELETE|PATCH|Get|Post|Put|Delete|Patch)\(\s*"(?P<path>[^"]+)""#,
                ],
            )?,
        );

        table.insert(
            Language::Rust,
            rules(
                &[
                    (r"^\s*(?:pub(?:\s*\([^)]*\))?\s+)?struct\s+([A-Za-z_]\w*)", Struct),
                    (r"^\s*(?:pub(?:\s*\([^)]*\))?\s+)?enum\s+([A-Za-z_]\w*)", Class),
                    (r"^\s*(?:pub(?:\s*\([^)]*\))?\s+)?trait\s+([A-Za-z_]\w*)", Interface),
                    (r"^\s*(?:pub(?:\s*\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+([A-Za-z_]\w*)", Function),
                ],
                &[r"^\s*(?:pub(?:\s*\([^)]*\))?\s+)?use\s+([A-Za-z_]\w*)"],
                &[
                    r#"#\[(?P<method>get|post|put|delete|patch)\(\s*"(?P<path>[^"]+)""#,
                    r#"\.route\(\s*"(?P<path>[^"]+)""#,
                ],
            )?,
        );

        Ok(Self { rules: table })
    }

    fn scan_file(&self, file: &FileEntry, acc: &mut Accumulator) {
        if let Some(deps) = manifest_dependencies(&file.path, &file.content) {
            acc.dependencies.extend(deps);
        }

        let Some(language) = Language::from_path(&file.path) else {
            return;
        };
        *acc.languages.entry(language.as_str().to_string()).or_insert(0) += 1;

        let Some(rules) = self.rules.get(&language) else {
            return;
        };

        for (idx, line) in file.content.lines().enumerate() {
            let line_no = idx + 1;

            for re in &rules.endpoints {
                if let Some(caps) = re.captures(line)
                    && let Some(path) = caps.name("path")
                {
                    let method = caps
                        .name("method")
                        .map(|m| http_method(m.as_str()))
                        .unwrap_or("ANY");
                    acc.endpoints.push(Symbol {
                        name: format!("{} {}", method, path.as_str()),
                        kind: SymbolKind::Endpoint,
                        path: file.path.clone(),
                        line: line_no,
                    });
                    break;
                }
            }

            for (re, kind) in &rules.symbols {
                if let Some(name) = re.captures(line).and_then(|c| c.get(1)) {
                    let symbol = Symbol {
                        name: name.as_str().to_string(),
                        kind: *kind,
                        path: file.path.clone(),
                        line: line_no,
                    };
                    if *kind == SymbolKind::Function {
                        acc.functions.push(symbol);
                    } else {
                        acc.classes.push(symbol);
                    }
                    // first match per line wins
                    break;
                }
            }

            for re in &rules.imports {
                if let Some(module) = re.captures(line).and_then(|c| c.get(1)) {
                    let module = module.as_str();
                    if !matches!(module, "crate" | "self" | "super") {
                        acc.dependencies.insert(module.to_string());
                    }
                    break;
                }
            }
        }
    }
}

#[derive(Default)]
struct Accumulator {
    endpoints: Vec<Symbol>,
    classes: Vec<Symbol>,
    functions: Vec<Symbol>,
    dependencies: BTreeSet<String>,
    languages: BTreeMap<String, usize>,
}

impl CodeScanner for HeuristicScanner {
    fn analyze(&self, repo_id: &str, tree: &FileTree) -> Result<AnalysisResult> {
        let mut files: Vec<&FileEntry> = tree.files.iter().collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let mut hasher = Sha256::new();
        let mut acc = Accumulator::default();
        for file in &files {
            hasher.update(file.path.as_bytes());
            hasher.update([0u8]);
            hasher.update(file.content.as_bytes());
            hasher.update([0u8]);
            self.scan_file(file, &mut acc);
        }

        let services = acc
            .classes
            .iter()
            .filter(|s| {
                let name = s.name.to_lowercase();
                SERVICE_INDICATORS.iter().any(|ind| name.contains(ind))
            })
            .cloned()
            .collect();

        tracing::debug!(
            repo = repo_id,
            files = files.len(),
            endpoints = acc.endpoints.len(),
            classes = acc.classes.len(),
            "Scanned repository"
        );

        Ok(AnalysisResult {
            repo_id: repo_id.to_string(),
            endpoints: acc.endpoints,
            classes: acc.classes,
            services,
            functions: acc.functions,
            dependencies: acc.dependencies.into_iter().collect(),
            file_count: files.len(),
            languages: acc.languages,
            fingerprint: format!("{:x}", hasher.finalize()),
            analyzed_at: Utc::now(),
        })
    }
}

fn http_method(raw: &str) -> &'static str {
    match raw.to_lowercase().as_str() {
        "get" => "GET",
        "post" => "POST",
        "put" => "PUT",
        "delete" => "DELETE",
        "patch" => "PATCH",
        _ => "ANY",
    }
}

// =============================================================================
// Manifests
// =============================================================================

/// Declared dependencies when `path` names a known manifest
fn manifest_dependencies(path: &str, content: &str) -> Option<Vec<String>> {
    let file_name = Path::new(path).file_name()?.to_str()?;
    let deps = match file_name {
        "package.json" => {
            let value: serde_json::Value = serde_json::from_str(content).ok()?;
            ["dependencies", "devDependencies", "peerDependencies"]
                .iter()
                .filter_map(|section| value.get(section)?.as_object())
                .flat_map(|obj| obj.keys().cloned())
                .collect()
        }
        "Cargo.toml" => {
            let table: toml::Table = toml::from_str(content).ok()?;
            ["dependencies", "dev-dependencies", "build-dependencies"]
                .iter()
                .filter_map(|section| table.get(*section)?.as_table())
                .flat_map(|t| t.keys().cloned())
                .collect()
        }
        "requirements.txt" => content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('-'))
            .filter_map(|l| {
                l.split(|c: char| "=<>~!;[ ".contains(c))
                    .next()
                    .map(str::to_string)
            })
            .filter(|name| !name.is_empty())
            .collect(),
        "go.mod" => {
            let mut in_block = false;
            let mut deps = Vec::new();
            for line in content.lines().map(str::trim) {
                if line.starts_with("require (") {
                    in_block = true;
                } else if in_block && line == ")" {
                    in_block = false;
                } else if let Some(rest) = line.strip_prefix("require ") {
                    deps.extend(rest.split_whitespace().next().map(String::from));
                } else if in_block && !line.is_empty() && !line.starts_with("//") {
                    deps.extend(line.split_whitespace().next().map(String::from));
                }
            }
            deps
        }
        _ => return None,
    };
    Some(deps)
}
