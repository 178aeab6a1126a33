//! C4 architecture model: levels, elements, relations and the diagram store

pub mod export;
pub mod model;
pub mod store;

pub use export::ExportFormat;
pub use model::{
    C4Diagram, C4Element, C4Level, C4Relation, Cursor, DiagramSummary, DiagramView, ElementKind,
    HierarchyEntry, NewElement,
};
pub use store::DiagramStore;
