//! C4 Diagram Model
//!
//! A diagram is a forest of elements across the four C4 levels plus directed
//! relations between them. Every non-Context element hangs off a parent exactly
//! one level above; mutation methods reject anything that would break that.
//!
//! ## Navigation
//!
//! A diagram carries a navigation cursor (`focus_id` + `current_level`). With no
//! focus the view shows the Context level; drilling into an element shows its
//! descendants. Highlights belong to the current view and are cleared whenever
//! the cursor moves.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ArchError, DiagramId, Result};

// =============================================================================
// Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum C4Level {
    Context,
    Container,
    Component,
    Code,
}

impl C4Level {
    pub const ALL: [C4Level; 4] = [
        C4Level::Context,
        C4Level::Container,
        C4Level::Component,
        C4Level::Code,
    ];

    /// Next level down, `None` at Code
    pub fn child(self) -> Option<C4Level> {
        match self {
            Self::Context => Some(Self::Container),
            Self::Container => Some(Self::Component),
            Self::Component => Some(Self::Code),
            Self::Code => None,
        }
    }

    /// Next level up, `None` at Context
    pub fn parent(self) -> Option<C4Level> {
        match self {
            Self::Context => None,
            Self::Container => Some(Self::Context),
            Self::Component => Some(Self::Container),
            Self::Code => Some(Self::Component),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Context => "context",
            Self::Container => "container",
            Self::Component => "component",
            Self::Code => "code",
        }
    }
}

impl fmt::Display for C4Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for C4Level {
    type Err = ArchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "context" | "system" => Ok(Self::Context),
            "container" => Ok(Self::Container),
            "component" => Ok(Self::Component),
            "code" => Ok(Self::Code),
            other => Err(ArchError::validation(format!(
                "unknown C4 level '{}' (expected context, container, component or code)",
                other
            ))),
        }
    }
}

// =============================================================================
// Element Kinds
// =============================================================================

/// What an element represents. Unknown strings are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ElementKind {
    Person,
    System,
    ExternalSystem,
    Container,
    Database,
    Component,
    Code,
    Other(String),
}

impl ElementKind {
    /// Kind assumed when the caller does not name one
    pub fn default_for(level: C4Level) -> Self {
        match level {
            C4Level::Context => Self::System,
            C4Level::Container => Self::Container,
            C4Level::Component => Self::Component,
            C4Level::Code => Self::Code,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Person => "person",
            Self::System => "system",
            Self::ExternalSystem => "external_system",
            Self::Container => "container",
            Self::Database => "database",
            Self::Component => "component",
            Self::Code => "code",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for ElementKind {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "person" | "actor" | "user" => Self::Person,
            "system" => Self::System,
            "external_system" | "external" => Self::ExternalSystem,
            "container" => Self::Container,
            "database" | "db" => Self::Database,
            "component" => Self::Component,
            "code" => Self::Code,
            _ => Self::Other(s.trim().to_string()),
        }
    }
}

impl From<String> for ElementKind {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<ElementKind> for String {
    fn from(kind: ElementKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Elements and Relations
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct C4Element {
    pub id: String,
    pub level: C4Level,
    pub name: String,
    pub kind: ElementKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub description: String,
}

/// Directed relation. Identity is the whole tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct C4Relation {
    pub source_id: String,
    pub target_id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technology: Option<String>,
}

/// Request to add an element
#[derive(Debug, Clone)]
pub struct NewElement {
    pub level: C4Level,
    pub name: String,
    pub kind: Option<ElementKind>,
    pub parent: Option<String>,
    pub technology: Option<String>,
    pub description: Option<String>,
}

impl NewElement {
    pub fn new(level: C4Level, name: impl Into<String>) -> Self {
        Self {
            level,
            name: name.into(),
            kind: None,
            parent: None,
            technology: None,
            description: None,
        }
    }

    /// Parent reference: an element id or an unambiguous element name
    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn kind(mut self, kind: impl Into<ElementKind>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn technology(mut self, technology: impl Into<String>) -> Self {
        self.technology = Some(technology.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

// =============================================================================
// Views
// =============================================================================

/// Snapshot of what the navigation cursor currently shows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramView {
    pub diagram_id: DiagramId,
    pub diagram_name: String,
    pub level: C4Level,
    pub focus_id: Option<String>,
    /// Ancestor ids from the root down to the focus (inclusive)
    pub breadcrumb: Vec<String>,
    pub elements: Vec<C4Element>,
    pub relations: Vec<C4Relation>,
    pub highlighted: Vec<String>,
}

impl DiagramView {
    pub fn is_highlighted(&self, element_id: &str) -> bool {
        self.highlighted.iter().any(|id| id == element_id)
    }

    pub fn element(&self, id: &str) -> Option<&C4Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// Plain-text rendering used by responders and the CLI
    pub fn render(&self) -> String {
        let mut out = String::new();
        let scope = match &self.focus_id {
            Some(_) => self.breadcrumb_names().join(" > "),
            None => "root".to_string(),
        };
        out.push_str(&format!(
            "{} [{} level, {}]\n",
            self.diagram_name, self.level, scope
        ));

        if self.elements.is_empty() {
            out.push_str("  (no elements at this level yet)\n");
        }
        for element in &self.elements {
            let marker = if self.is_highlighted(&element.id) {
                "*"
            } else {
                "-"
            };
            out.push_str(&format!(
                "  {} {} ({}, {}",
                marker, element.name, element.id, element.kind
            ));
            if let Some(tech) = &element.technology {
                out.push_str(&format!(", {}", tech));
            }
            out.push_str(")\n");
        }
        for rel in &self.relations {
            let source = self
                .element(&rel.source_id)
                .map_or(rel.source_id.as_str(), |e| e.name.as_str());
            let target = self
                .element(&rel.target_id)
                .map_or(rel.target_id.as_str(), |e| e.name.as_str());
            out.push_str(&format!("  {} -> {}: {}\n", source, target, rel.label));
        }
        out
    }

    // Breadcrumb ids are only resolvable for elements inside the view, so fall back to ids.
    fn breadcrumb_names(&self) -> Vec<String> {
        self.breadcrumb
            .iter()
            .map(|id| {
                self.element(id)
                    .map_or_else(|| id.clone(), |e| e.name.clone())
            })
            .collect()
    }
}

/// One element with its direct children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchyEntry {
    pub id: String,
    pub name: String,
    pub level: C4Level,
    pub kind: ElementKind,
    pub children: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramSummary {
    pub id: DiagramId,
    pub name: String,
    pub element_count: usize,
    pub relation_count: usize,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Diagram
// =============================================================================

/// Navigation position: the focused element and the level shown below it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub focus_id: Option<String>,
    pub level: C4Level,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct C4Diagram {
    pub id: DiagramId,
    pub name: String,
    pub root_id: String,
    /// Insertion order; parents always precede their children
    pub elements: Vec<C4Element>,
    pub relations: Vec<C4Relation>,
    pub current_level: C4Level,
    pub focus_id: Option<String>,
    /// Cursors saved by `drill_down`, most recent last
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trail: Vec<Cursor>,
    #[serde(skip)]
    pub highlighted: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl C4Diagram {
    /// New diagram holding a single Context-level system element
    pub fn new(
        id: DiagramId,
        system_name: &str,
        description: Option<&str>,
    ) -> Result<Self> {
        let name = system_name.trim();
        if name.is_empty() {
            return Err(ArchError::validation("system name must not be empty"));
        }

        let now = Utc::now();
        let root = C4Element {
            id: "el-1".to_string(),
            level: C4Level::Context,
            name: name.to_string(),
            kind: ElementKind::System,
            technology: None,
            parent_id: None,
            description: description.unwrap_or_default().to_string(),
        };

        Ok(Self {
            id,
            name: name.to_string(),
            root_id: root.id.clone(),
            elements: vec![root],
            relations: Vec::new(),
            current_level: C4Level::Context,
            focus_id: None,
            trail: Vec::new(),
            highlighted: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn element(&self, id: &str) -> Option<&C4Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// Resolve an element by id, falling back to a case-insensitive unique name match
    pub fn resolve(&self, reference: &str) -> Result<&C4Element> {
        let reference = reference.trim();
        if let Some(element) = self.element(reference) {
            return Ok(element);
        }

        let mut matches = self
            .elements
            .iter()
            .filter(|e| e.name.eq_ignore_ascii_case(reference));
        match (matches.next(), matches.next()) {
            (Some(element), None) => Ok(element),
            (Some(_), Some(_)) => Err(ArchError::validation(format!(
                "element name '{}' is ambiguous in diagram '{}', use an element id",
                reference, self.id
            ))),
            _ => Err(ArchError::not_found("element", reference)),
        }
    }

    /// Scan existing ids and hand out the next "el-{N}"
    fn next_element_id(&self) -> String {
        let max = self
            .elements
            .iter()
            .filter_map(|e| e.id.strip_prefix("el-").and_then(|s| s.parse::<u64>().ok()))
            .max()
            .unwrap_or(0);
        format!("el-{}", max + 1)
    }

    pub fn add_element(&mut self, new: NewElement) -> Result<String> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(ArchError::validation("element name must not be empty"));
        }

        let parent_id = match new.parent.as_deref() {
            None => {
                if new.level != C4Level::Context {
                    return Err(ArchError::invariant(format!(
                        "{} element '{}' needs a parent at the {} level",
                        new.level,
                        name,
                        new.level.parent().map_or("", C4Level::as_str)
                    )));
                }
                None
            }
            Some(reference) => {
                let parent = self.resolve(reference)?;
                if parent.level.child() != Some(new.level) {
                    return Err(ArchError::invariant(format!(
                        "{} element '{}' cannot be placed under {} element '{}'; children must be exactly one level below their parent",
                        new.level, name, parent.level, parent.name
                    )));
                }
                Some(parent.id.clone())
            }
        };

        let id = self.next_element_id();
        self.elements.push(C4Element {
            id: id.clone(),
            level: new.level,
            name: name.to_string(),
            kind: new.kind.unwrap_or_else(|| ElementKind::default_for(new.level)),
            technology: new.technology.filter(|t| !t.trim().is_empty()),
            parent_id,
            description: new.description.unwrap_or_default(),
        });
        self.touch();
        Ok(id)
    }

    /// Returns `true` when a new relation was stored, `false` for an identical existing one
    pub fn add_relation(
        &mut self,
        source: &str,
        target: &str,
        label: &str,
        technology: Option<&str>,
    ) -> Result<bool> {
        let relation = C4Relation {
            source_id: self.resolve(source)?.id.clone(),
            target_id: self.resolve(target)?.id.clone(),
            label: label.trim().to_string(),
            technology: technology
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from),
        };

        if self.relations.contains(&relation) {
            return Ok(false);
        }
        self.relations.push(relation);
        self.touch();
        Ok(true)
    }

    /// Focus on an element and show its descendants
    pub fn drill_down(&mut self, reference: &str) -> Result<DiagramView> {
        let element = self.resolve(reference)?;
        let Some(child_level) = element.level.child() else {
            return Err(ArchError::invalid_state(format!(
                "'{}' is at the code level; there is nothing below it",
                element.name
            )));
        };

        let focus_id = Some(element.id.clone());
        if self.focus_id == focus_id && self.current_level == child_level {
            self.highlighted.clear();
            return Ok(self.view());
        }

        self.trail.push(Cursor {
            focus_id: self.focus_id.take(),
            level: self.current_level,
        });
        self.focus_id = focus_id;
        self.current_level = child_level;
        self.highlighted.clear();
        Ok(self.view())
    }

    /// Return to the cursor before the last `drill_down`.
    ///
    /// With no saved cursor (e.g. a diagram loaded from an older snapshot) focus
    /// moves to the focused element's parent, or back to the root view.
    pub fn drill_up(&mut self) -> DiagramView {
        self.highlighted.clear();

        if let Some(cursor) = self.trail.pop() {
            let known = cursor
                .focus_id
                .as_deref()
                .is_none_or(|id| self.element(id).is_some());
            if known {
                self.focus_id = cursor.focus_id;
                self.current_level = cursor.level;
                return self.view();
            }
            self.trail.clear();
        }

        if let Some(focus) = self.focus_id.take() {
            let parent = self
                .element(&focus)
                .and_then(|e| e.parent_id.as_deref())
                .and_then(|id| self.element(id))
                .map(|p| (p.id.clone(), p.level));

            match parent {
                Some((parent_id, parent_level)) => {
                    self.focus_id = Some(parent_id);
                    self.current_level = parent_level.child().unwrap_or(C4Level::Code);
                }
                None => self.current_level = C4Level::Context,
            }
        }
        self.view()
    }

    /// Replace the highlight set; nothing changes if any reference is unknown
    pub fn highlight(&mut self, references: &[String]) -> Result<DiagramView> {
        let mut resolved: Vec<String> = Vec::with_capacity(references.len());
        for reference in references {
            let id = self.resolve(reference)?.id.clone();
            if !resolved.contains(&id) {
                resolved.push(id);
            }
        }
        self.highlighted = resolved;
        Ok(self.view())
    }

    /// Current view without moving the cursor
    pub fn view(&self) -> DiagramView {
        let elements: Vec<C4Element> = match &self.focus_id {
            None => self
                .elements
                .iter()
                .filter(|e| e.level == C4Level::Context)
                .cloned()
                .collect(),
            Some(focus) => self.descendants(focus).into_iter().cloned().collect(),
        };

        let visible: HashSet<&str> = elements.iter().map(|e| e.id.as_str()).collect();
        let relations = self
            .relations
            .iter()
            .filter(|r| {
                visible.contains(r.source_id.as_str()) && visible.contains(r.target_id.as_str())
            })
            .cloned()
            .collect();

        DiagramView {
            diagram_id: self.id.clone(),
            diagram_name: self.name.clone(),
            level: self.current_level,
            focus_id: self.focus_id.clone(),
            breadcrumb: self
                .focus_id
                .as_deref()
                .map(|f| self.breadcrumb(f))
                .unwrap_or_default(),
            elements,
            relations,
            highlighted: self.highlighted.clone(),
        }
    }

    /// All elements below `id`, in insertion order
    pub fn descendants(&self, id: &str) -> Vec<&C4Element> {
        // Parents precede children, so one forward pass collects the whole subtree.
        let mut inside: HashSet<&str> = HashSet::from([id]);
        let mut found = Vec::new();
        for element in &self.elements {
            if let Some(parent) = element.parent_id.as_deref()
                && inside.contains(parent)
            {
                inside.insert(element.id.as_str());
                found.push(element);
            }
        }
        found
    }

    /// Ancestor ids from the root down to `id` (inclusive)
    pub fn breadcrumb(&self, id: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut cursor = self.element(id);
        while let Some(element) = cursor {
            // A malformed restored diagram must not loop forever
            if chain.len() > self.elements.len() {
                break;
            }
            chain.push(element.id.clone());
            cursor = element.parent_id.as_deref().and_then(|p| self.element(p));
        }
        chain.reverse();
        chain
    }

    pub fn hierarchy(&self) -> Vec<HierarchyEntry> {
        self.elements
            .iter()
            .map(|e| HierarchyEntry {
                id: e.id.clone(),
                name: e.name.clone(),
                level: e.level,
                kind: e.kind.clone(),
                children: self
                    .elements
                    .iter()
                    .filter(|c| c.parent_id.as_deref() == Some(e.id.as_str()))
                    .map(|c| c.id.clone())
                    .collect(),
            })
            .collect()
    }

    pub fn summary(&self) -> DiagramSummary {
        DiagramSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            element_count: self.elements.len(),
            relation_count: self.relations.len(),
            updated_at: self.updated_at,
        }
    }

    /// Verify the level forest and relation endpoints, used when loading persisted diagrams
    pub fn check_integrity(&self) -> Result<()> {
        let mut seen: HashSet<&str> = HashSet::new();
        for element in &self.elements {
            if !seen.insert(element.id.as_str()) {
                return Err(ArchError::invariant(format!(
                    "duplicate element id '{}'",
                    element.id
                )));
            }
            match element.parent_id.as_deref() {
                None if element.level != C4Level::Context => {
                    return Err(ArchError::invariant(format!(
                        "{} element '{}' has no parent",
                        element.level, element.id
                    )));
                }
                None => {}
                Some(parent_id) => {
                    // Parents must already have been seen; this also rules out cycles.
                    let parent = self
                        .element(parent_id)
                        .filter(|_| seen.contains(parent_id))
                        .ok_or_else(|| {
                            ArchError::invariant(format!(
                                "element '{}' references missing parent '{}'",
                                element.id, parent_id
                            ))
                        })?;
                    if parent.level.child() != Some(element.level) {
                        return Err(ArchError::invariant(format!(
                            "element '{}' skips a level below '{}'",
                            element.id, parent.id
                        )));
                    }
                }
            }
        }

        if self.element(&self.root_id).is_none() {
            return Err(ArchError::invariant(format!(
                "root element '{}' is missing",
                self.root_id
            )));
        }
        for rel in &self.relations {
            if !seen.contains(rel.source_id.as_str()) || !seen.contains(rel.target_id.as_str()) {
                return Err(ArchError::invariant(format!(
                    "relation {} -> {} has a dangling endpoint",
                    rel.source_id, rel.target_id
                )));
            }
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ErrorKind;
    use proptest::prelude::*;

    fn shop() -> C4Diagram {
        C4Diagram::new(DiagramId::new("d-1"), "Shop", Some("Online shop")).unwrap()
    }

    #[test]
    fn test_level_navigation() {
        assert_eq!(C4Level::Context.child(), Some(C4Level::Container));
        assert_eq!(C4Level::Code.child(), None);
        assert_eq!(C4Level::Context.parent(), None);
        assert_eq!(C4Level::Code.parent(), Some(C4Level::Component));
        assert_eq!("Component".parse::<C4Level>().unwrap(), C4Level::Component);
        assert!("layer".parse::<C4Level>().is_err());
    }

    #[test]
    fn test_kind_parsing_keeps_unknown() {
        assert_eq!(ElementKind::from("actor"), ElementKind::Person);
        assert_eq!(ElementKind::from("External System"), ElementKind::ExternalSystem);
        assert_eq!(ElementKind::from("queue"), ElementKind::Other("queue".into()));
        let json = serde_json::to_string(&ElementKind::ExternalSystem).unwrap();
        assert_eq!(json, "\"external_system\"");
    }

    #[test]
    fn test_new_diagram_has_single_root() {
        let d = shop();
        assert_eq!(d.elements.len(), 1);
        assert_eq!(d.elements[0].name, "Shop");
        assert_eq!(d.elements[0].level, C4Level::Context);
        assert_eq!(d.root_id, "el-1");
        assert!(d.focus_id.is_none());
    }

    #[test]
    fn test_blank_system_name_rejected() {
        let err = C4Diagram::new(DiagramId::new("d"), "   ", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_skipping_a_level_is_rejected() {
        let mut d = shop();
        d.add_element(NewElement::new(C4Level::Container, "API").parent("el-1"))
            .unwrap();
        let err = d
            .add_element(NewElement::new(C4Level::Component, "X").parent("Shop"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
        assert_eq!(d.elements.len(), 2);
    }

    #[test]
    fn test_orphan_container_rejected() {
        let mut d = shop();
        let err = d
            .add_element(NewElement::new(C4Level::Container, "API"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    }

    #[test]
    fn test_unknown_parent_is_not_found() {
        let mut d = shop();
        let err = d
            .add_element(NewElement::new(C4Level::Container, "API").parent("el-42"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_element_ids_keep_increasing() {
        let mut d = shop();
        let a = d
            .add_element(NewElement::new(C4Level::Container, "API").parent("el-1"))
            .unwrap();
        let b = d
            .add_element(NewElement::new(C4Level::Container, "DB").parent("el-1").kind("database"))
            .unwrap();
        assert_eq!(a, "el-2");
        assert_eq!(b, "el-3");
        assert_eq!(d.element(&b).unwrap().kind, ElementKind::Database);
    }

    #[test]
    fn test_add_relation_is_idempotent() {
        let mut d = shop();
        let api = d
            .add_element(NewElement::new(C4Level::Container, "API").parent("el-1"))
            .unwrap();
        let db = d
            .add_element(NewElement::new(C4Level::Container, "DB").parent("el-1"))
            .unwrap();
        assert!(d.add_relation(&api, &db, "reads", Some("SQL")).unwrap());
        assert!(!d.add_relation("API", "DB", "reads", Some("SQL")).unwrap());
        assert_eq!(d.relations.len(), 1);
        // A different label is a different relation
        assert!(d.add_relation(&api, &db, "writes", Some("SQL")).unwrap());
        assert_eq!(d.relations.len(), 2);
    }

    #[test]
    fn test_dangling_relation_rejected() {
        let mut d = shop();
        let err = d.add_relation("el-1", "el-9", "calls", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(d.relations.is_empty());
    }

    #[test]
    fn test_drill_down_shows_descendants() {
        let mut d = shop();
        let api = d
            .add_element(NewElement::new(C4Level::Container, "API").parent("el-1"))
            .unwrap();
        let auth = d
            .add_element(NewElement::new(C4Level::Component, "Auth").parent(&api))
            .unwrap();
        d.add_element(NewElement::new(C4Level::Context, "Payments").kind("external_system"))
            .unwrap();

        let view = d.drill_down("el-1").unwrap();
        assert_eq!(view.level, C4Level::Container);
        assert_eq!(view.focus_id.as_deref(), Some("el-1"));
        assert_eq!(view.breadcrumb, vec!["el-1".to_string()]);
        let ids: Vec<&str> = view.elements.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec![api.as_str(), auth.as_str()]);

        let view = d.drill_down(&api).unwrap();
        assert_eq!(view.level, C4Level::Component);
        assert_eq!(view.breadcrumb, vec!["el-1".to_string(), api.clone()]);
        assert_eq!(view.elements.len(), 1);
    }

    #[test]
    fn test_drill_down_below_code_is_invalid_state() {
        let mut d = shop();
        let api = d
            .add_element(NewElement::new(C4Level::Container, "API").parent("el-1"))
            .unwrap();
        let auth = d
            .add_element(NewElement::new(C4Level::Component, "Auth").parent(&api))
            .unwrap();
        let token = d
            .add_element(NewElement::new(C4Level::Code, "TokenSigner").parent(&auth))
            .unwrap();
        let err = d.drill_down(&token).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_drill_up_restores_previous_cursor() {
        let mut d = shop();
        let api = d
            .add_element(NewElement::new(C4Level::Container, "API").parent("el-1"))
            .unwrap();

        d.drill_down("el-1").unwrap();
        let (focus, level) = (d.focus_id.clone(), d.current_level);
        d.drill_down(&api).unwrap();
        let view = d.drill_up();
        assert_eq!(view.focus_id, focus);
        assert_eq!(view.level, level);

        let view = d.drill_up();
        assert_eq!(view.focus_id, None);
        assert_eq!(view.level, C4Level::Context);

        // At the root the cursor stays put
        let view = d.drill_up();
        assert_eq!(view.focus_id, None);
        assert_eq!(view.elements.len(), 1);
    }

    #[test]
    fn test_drill_up_after_jumping_past_a_level() {
        let mut d = shop();
        let api = d
            .add_element(NewElement::new(C4Level::Container, "API").parent("el-1"))
            .unwrap();

        // Root view straight into a container, skipping the system
        d.drill_down(&api).unwrap();
        assert_eq!(d.current_level, C4Level::Component);
        let view = d.drill_up();
        assert_eq!(view.focus_id, None);
        assert_eq!(view.level, C4Level::Context);
    }

    #[test]
    fn test_drill_up_between_context_elements() {
        let mut d = shop();
        let gateway = NewElement::new(C4Level::Context, "Payment Gateway")
            .kind(ElementKind::ExternalSystem);
        let gateway = d.add_element(gateway).unwrap();

        d.drill_down("el-1").unwrap();
        d.drill_down(&gateway).unwrap();
        assert_eq!(d.focus_id.as_deref(), Some(gateway.as_str()));

        let view = d.drill_up();
        assert_eq!(view.focus_id.as_deref(), Some("el-1"));
        assert_eq!(view.level, C4Level::Container);

        let view = d.drill_up();
        assert_eq!(view.focus_id, None);
        assert_eq!(view.level, C4Level::Context);
    }

    #[test]
    fn test_drill_up_without_trail_walks_to_parent() {
        let mut d = shop();
        let api = d
            .add_element(NewElement::new(C4Level::Container, "API").parent("el-1"))
            .unwrap();
        d.drill_down(&api).unwrap();

        // Snapshots written before the trail existed carry no saved cursors
        let mut json = serde_json::to_value(&d).unwrap();
        json.as_object_mut().unwrap().remove("trail");
        let mut restored: C4Diagram = serde_json::from_value(json).unwrap();
        assert!(restored.trail.is_empty());

        let view = restored.drill_up();
        assert_eq!(view.focus_id.as_deref(), Some("el-1"));
        assert_eq!(view.level, C4Level::Container);
    }

    #[test]
    fn test_highlight_unknown_marks_nothing() {
        let mut d = shop();
        let err = d
            .highlight(&["el-1".to_string(), "ghost".to_string()])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(d.highlighted.is_empty());
    }

    #[test]
    fn test_navigation_clears_highlights() {
        let mut d = shop();
        d.add_element(NewElement::new(C4Level::Container, "API").parent("el-1"))
            .unwrap();
        let view = d.highlight(&["Shop".to_string()]).unwrap();
        assert!(view.is_highlighted("el-1"));

        let view = d.drill_down("el-1").unwrap();
        assert!(view.highlighted.is_empty());

        d.highlight(&["API".to_string()]).unwrap();
        let view = d.drill_up();
        assert!(view.highlighted.is_empty());
    }

    #[test]
    fn test_view_relations_need_both_endpoints_visible() {
        let mut d = shop();
        let api = d
            .add_element(NewElement::new(C4Level::Container, "API").parent("el-1"))
            .unwrap();
        let payments = d
            .add_element(NewElement::new(C4Level::Context, "Payments"))
            .unwrap();
        d.add_relation(&api, &payments, "charges", None).unwrap();
        d.add_relation("el-1", &payments, "uses", None).unwrap();

        let root = d.view();
        assert_eq!(root.relations.len(), 1);
        assert_eq!(root.relations[0].label, "uses");

        let inside = d.drill_down("el-1").unwrap();
        assert!(inside.relations.is_empty());
    }

    #[test]
    fn test_ambiguous_name_is_rejected() {
        let mut d = shop();
        d.add_element(NewElement::new(C4Level::Container, "Worker").parent("el-1"))
            .unwrap();
        d.add_element(NewElement::new(C4Level::Container, "worker").parent("el-1"))
            .unwrap();
        let err = d.drill_down("WORKER").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_hierarchy_lists_children() {
        let mut d = shop();
        let api = d
            .add_element(NewElement::new(C4Level::Container, "API").parent("el-1"))
            .unwrap();
        let entries = d.hierarchy();
        assert_eq!(entries[0].children, vec![api]);
        assert!(entries[1].children.is_empty());
    }

    #[test]
    fn test_integrity_rejects_skipped_level() {
        let mut d = shop();
        d.elements.push(C4Element {
            id: "el-2".into(),
            level: C4Level::Component,
            name: "Bad".into(),
            kind: ElementKind::Component,
            technology: None,
            parent_id: Some("el-1".into()),
            description: String::new(),
        });
        assert!(d.check_integrity().is_err());
    }

    #[derive(Debug, Clone)]
    struct Insert {
        level: usize,
        parent: usize,
    }

    fn insert_strategy() -> impl Strategy<Value = Insert> {
        (0usize..4, 0usize..64).prop_map(|(level, parent)| Insert { level, parent })
    }

    proptest! {
        #[test]
        fn prop_forest_invariant_holds(ops in prop::collection::vec(insert_strategy(), 1..60)) {
            let mut d = shop();
            for op in ops {
                let level = C4Level::ALL[op.level];
                let parent = if op.parent % 5 == 0 {
                    None
                } else {
                    let idx = op.parent % d.elements.len();
                    Some(d.elements[idx].id.clone())
                };
                let mut new = NewElement::new(level, format!("n{}", d.elements.len()));
                if let Some(p) = &parent {
                    new = new.parent(p.clone());
                }
                let before = d.elements.len();
                match d.add_element(new) {
                    Ok(_) => prop_assert_eq!(d.elements.len(), before + 1),
                    Err(err) => {
                        prop_assert_eq!(d.elements.len(), before);
                        prop_assert_eq!(err.kind(), ErrorKind::InvariantViolation);
                    }
                }
            }

            prop_assert!(d.check_integrity().is_ok());
            for element in &d.elements {
                let chain = d.breadcrumb(&element.id);
                prop_assert_eq!(chain.len(), element.level as usize + 1);
                prop_assert_eq!(d.element(&chain[0]).map(|e| e.level), Some(C4Level::Context));
            }
        }
    }
}
