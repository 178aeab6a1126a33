//! Global Constants
//!
//! Centralized constants for configuration and tuning.
//! All magic numbers should be defined here with documentation.

/// Agent manager constants
pub mod agents {
    /// Maximum live agents (overridable in config)
    pub const DEFAULT_MAX_AGENTS: usize = 10;

    /// Exchanges kept in an agent's transcript
    pub const DEFAULT_HISTORY_LIMIT: usize = 50;

    /// Upper bound accepted for `agents.history_limit`
    pub const MAX_HISTORY_LIMIT: usize = 10_000;
}

/// Repository access constants
pub mod repository {
    /// Maximum file size read from a repository (1MB)
    pub const DEFAULT_MAX_FILE_SIZE: u64 = 1_048_576;

    /// Maximum matches returned by one code search
    pub const MAX_SEARCH_MATCHES: usize = 50;

    /// Snippets longer than this are truncated
    pub const MAX_SNIPPET_CHARS: usize = 200;

    /// Directories skipped when walking a checkout
    pub const DEFAULT_SKIP_DIRS: &[&str] = &[
        "node_modules",
        "target",
        ".git",
        "build",
        "dist",
        "__pycache__",
        "vendor",
        ".venv",
    ];
}

/// Code analysis constants
pub mod analysis {
    /// Class names containing one of these are treated as services
    pub const SERVICE_INDICATORS: &[&str] = &[
        "service",
        "api",
        "controller",
        "handler",
        "endpoint",
        "server",
        "app",
        "main",
        "application",
    ];

    /// Maximum references returned by `find_code_references`
    pub const MAX_REFERENCES: usize = 100;
}

/// Timeout defaults (seconds)
pub mod timeouts {
    pub const DEFAULT_REPOSITORY_SECS: u64 = 30;
    pub const DEFAULT_SCANNER_SECS: u64 = 60;
}

/// HTTP/Network constants
pub mod network {
    /// Default request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 30;
}

/// Inference defaults
pub mod llm {
    pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
    pub const DEFAULT_OLLAMA_MODEL: &str = "llama2";
    pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";
    pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
    pub const DEFAULT_TEMPERATURE: f32 = 0.2;

    /// Prior exchanges included in prompts
    pub const PROMPT_HISTORY_TURNS: usize = 4;
}
