pub mod error;

pub use error::{ArchError, ErrorKind, ErrorReport, Result, ResultExt};

// =============================================================================
// Domain Newtypes
// =============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

/// Type-safe wrapper for agent IDs
///
/// Prevents accidental mixing of agent IDs with diagram IDs or names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Type-safe wrapper for diagram IDs
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiagramId(String);

impl DiagramId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DiagramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DiagramId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DiagramId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for DiagramId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(AgentId::generate(), AgentId::generate());
        assert_ne!(DiagramId::generate(), DiagramId::generate());
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let id = DiagramId::new("d-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"d-1\"");
        let back: DiagramId = serde_json::from_str("\"d-1\"").unwrap();
        assert_eq!(back, id);
    }
}
