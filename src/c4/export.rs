//! Diagram export: JSON, Graphviz DOT and Mermaid flowcharts

use std::fmt;
use std::str::FromStr;

use super::model::{C4Diagram, C4Element, ElementKind};
use crate::types::{ArchError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Dot,
    Mermaid,
}

impl FromStr for ExportFormat {
    type Err = ArchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "dot" | "graphviz" => Ok(Self::Dot),
            "mermaid" | "mmd" => Ok(Self::Mermaid),
            other => Err(ArchError::validation(format!(
                "unknown export format '{}' (expected json, dot or mermaid)",
                other
            ))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Dot => write!(f, "dot"),
            Self::Mermaid => write!(f, "mermaid"),
        }
    }
}

pub fn export(diagram: &C4Diagram, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(diagram)?),
        ExportFormat::Dot => Ok(to_dot(diagram)),
        ExportFormat::Mermaid => Ok(to_mermaid(diagram)),
    }
}

/// Graphviz rendering; parent links are drawn dashed
pub fn to_dot(diagram: &C4Diagram) -> String {
    let mut lines = vec![
        format!("digraph \"{}\" {{", escape(&diagram.name)),
        "  rankdir=TB;".to_string(),
        "  node [shape=box, style=filled, fillcolor=lightblue];".to_string(),
    ];

    for element in &diagram.elements {
        let shape = match element.kind {
            ElementKind::Person => ", shape=ellipse",
            ElementKind::Database => ", shape=cylinder",
            _ => "",
        };
        lines.push(format!(
            "  \"{}\" [label=\"{}\\n[{}]\"{}];",
            element.id,
            escape(&element.name),
            kind_label(element),
            shape
        ));
    }

    for element in &diagram.elements {
        if let Some(parent) = &element.parent_id {
            lines.push(format!(
                "  \"{}\" -> \"{}\" [style=dashed, arrowhead=none];",
                parent, element.id
            ));
        }
    }

    for rel in &diagram.relations {
        lines.push(format!(
            "  \"{}\" -> \"{}\" [label=\"{}\"];",
            rel.source_id,
            rel.target_id,
            escape(&rel.label)
        ));
    }

    lines.push("}".to_string());
    lines.join("\n")
}

/// Mermaid flowchart with one subgraph per element that has children
pub fn to_mermaid(diagram: &C4Diagram) -> String {
    let mut out = String::from("flowchart TB\n");
    for root in diagram.elements.iter().filter(|e| e.parent_id.is_none()) {
        write_mermaid_element(diagram, root, 1, &mut out);
    }
    for rel in &diagram.relations {
        let id_s = mermaid_id(&rel.source_id);
        let id_t = mermaid_id(&rel.target_id);
        if rel.label.is_empty() {
            out.push_str(&format!("    {} --> {}\n", id_s, id_t));
        } else {
            out.push_str(&format!(
                "    {} -->|\"{}\"| {}\n",
                id_s,
                rel.label.replace('"', "'"),
                id_t
            ));
        }
    }
    out
}

fn write_mermaid_element(diagram: &C4Diagram, element: &C4Element, depth: usize, out: &mut String) {
    let indent = "    ".repeat(depth);
    let children: Vec<&C4Element> = diagram
        .elements
        .iter()
        .filter(|c| c.parent_id.as_deref() == Some(element.id.as_str()))
        .collect();
    let label = format!("{}<br/>[{}]", element.name, kind_label(element)).replace('"', "'");

    if children.is_empty() {
        out.push_str(&format!(
            "{}{}[\"{}\"]\n",
            indent,
            mermaid_id(&element.id),
            label
        ));
        return;
    }

    out.push_str(&format!(
        "{}subgraph {}[\"{}\"]\n",
        indent,
        mermaid_id(&element.id),
        label
    ));
    for child in children {
        write_mermaid_element(diagram, child, depth + 1, out);
    }
    out.push_str(&format!("{}end\n", indent));
}

fn kind_label(element: &C4Element) -> String {
    match &element.technology {
        Some(tech) => format!("{}: {}", element.kind, tech),
        None => element.kind.to_string(),
    }
}

// Mermaid ids cannot contain dashes
fn mermaid_id(id: &str) -> String {
    id.replace('-', "_")
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::c4::model::{C4Level, NewElement};
    use crate::types::DiagramId;

    fn sample() -> C4Diagram {
        let mut d = C4Diagram::new(DiagramId::new("d-1"), "Shop", None).unwrap();
        d.add_element(NewElement::new(C4Level::Container, "API").parent("el-1").technology("Rust"))
            .unwrap();
        d.add_element(NewElement::new(C4Level::Container, "Orders DB").parent("el-1").kind("database"))
            .unwrap();
        d.add_relation("API", "Orders DB", "reads \"orders\"", None).unwrap();
        d
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("DOT".parse::<ExportFormat>().unwrap(), ExportFormat::Dot);
        assert_eq!("mermaid".parse::<ExportFormat>().unwrap(), ExportFormat::Mermaid);
        assert!("svg".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn test_dot_contains_every_element() {
        let dot = to_dot(&sample());
        assert!(dot.starts_with("digraph \"Shop\" {"));
        for id in ["el-1", "el-2", "el-3"] {
            assert!(dot.contains(&format!("\"{}\" [label=", id)));
        }
        assert!(dot.contains("shape=cylinder"));
        assert!(dot.contains("reads \\\"orders\\\""));
        assert!(dot.ends_with('}'));
    }

    #[test]
    fn test_mermaid_nests_children() {
        let mmd = to_mermaid(&sample());
        assert!(mmd.starts_with("flowchart TB"));
        assert!(mmd.contains("subgraph el_1"));
        assert!(mmd.contains("el_2[\"API<br/>[container: Rust]\"]"));
        assert!(mmd.contains("el_2 -->|\"reads 'orders'\"| el_3"));
    }

    #[test]
    fn test_json_round_trips_ids() {
        let d = sample();
        let json = export(&d, ExportFormat::Json).unwrap();
        let back: C4Diagram = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, d.id);
        assert_eq!(back.elements.len(), 3);
        assert!(back.check_integrity().is_ok());
    }
}
