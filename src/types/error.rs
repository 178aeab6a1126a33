//! Unified Error Type System
//!
//! Centralized error types for the entire application.
//!
//! ## Error Kinds
//!
//! Every error maps onto one caller-facing [`ErrorKind`]:
//!
//! - **Validation**: bad caller input, never retried
//! - **NotFound**: referenced id absent, never retried
//! - **InvariantViolation**: would break the C4 level forest, caller logic error
//! - **Conflict**: duplicate name or id
//! - **Schema**: tool arguments malformed, rejected before execution
//! - **Upstream**: external collaborator failed or timed out (retryable by the caller)
//! - **InvalidState**: operation not legal in the current diagram view
//!
//! Errors crossing the tool boundary are flattened into [`ErrorReport`] values
//! so the orchestration workflow can keep going after a failure.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Error Kinds
// =============================================================================

/// Caller-facing error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    InvariantViolation,
    Conflict,
    Schema,
    Upstream,
    InvalidState,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "ValidationError"),
            Self::NotFound => write!(f, "NotFoundError"),
            Self::InvariantViolation => write!(f, "InvariantViolation"),
            Self::Conflict => write!(f, "ConflictError"),
            Self::Schema => write!(f, "SchemaError"),
            Self::Upstream => write!(f, "UpstreamError"),
            Self::InvalidState => write!(f, "InvalidState"),
        }
    }
}

impl ErrorKind {
    /// Only upstream failures are worth retrying; everything else needs a different request
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream)
    }
}

// =============================================================================
// Error Report
// =============================================================================

/// Flattened, serializable error used inside tool results and turn outcomes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<&ArchError> for ErrorReport {
    fn from(err: &ArchError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<ArchError> for ErrorReport {
    fn from(err: ArchError) -> Self {
        Self::from(&err)
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum ArchError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{entity} '{id}' not found")]
    NotFound { entity: String, id: String },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid arguments for tool '{tool}': {message}")]
    Schema { tool: String, message: String },

    #[error("{service} failed: {message}")]
    Upstream { service: String, message: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Operation timeout with context
    #[error("Timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<anyhow::Error> for ArchError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            return ArchError::Io(std::io::Error::new(io_err.kind(), io_err.to_string()));
        }
        ArchError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ArchError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl ArchError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn schema(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            tool: tool.into(),
            message: message.into(),
        }
    }

    pub fn upstream(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Caller-facing classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::Json(_) | Self::Config(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvariantViolation(_) => ErrorKind::InvariantViolation,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Schema { .. } => ErrorKind::Schema,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            // Storage and filesystem are collaborators too; callers may retry
            Self::Upstream { .. }
            | Self::Timeout { .. }
            | Self::Io(_)
            | Self::Database(_)
            | Self::Storage(_) => ErrorKind::Upstream,
        }
    }

    /// Check if this error is recoverable (can be retried)
    pub fn is_recoverable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;

    /// Add context using a closure (lazy evaluation)
    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| ArchError::Storage(format!("{}: {}", context.into(), e)))
    }

    fn with_context_fn<F, C>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: Into<String>,
    {
        self.map_err(|e| ArchError::Storage(format!("{}: {}", f().into(), e)))
    }
}

// =============================================================================
// Tests
// =============================================================================
