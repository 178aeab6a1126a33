//! Diagram Store
//!
//! Owns every [`C4Diagram`] and is the only place diagrams are mutated.
//! Each diagram sits behind its own mutex so operations on one diagram are
//! serialized while different diagrams proceed independently.

use std::sync::{Arc, Mutex, MutexGuard};

use dashmap::DashMap;
use tracing::{debug, info};

use super::export::{ExportFormat, export};
use super::model::{C4Diagram, DiagramSummary, DiagramView, HierarchyEntry, NewElement};
use crate::types::{ArchError, DiagramId, Result};

#[derive(Default)]
pub struct DiagramStore {
    diagrams: DashMap<DiagramId, Arc<Mutex<C4Diagram>>>,
}

impl DiagramStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.diagrams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagrams.is_empty()
    }

    pub fn contains(&self, id: &DiagramId) -> bool {
        self.diagrams.contains_key(id)
    }

    /// Run `f` with exclusive access to one diagram
    fn with_diagram<T>(
        &self,
        id: &DiagramId,
        f: impl FnOnce(&mut C4Diagram) -> Result<T>,
    ) -> Result<T> {
        // Clone the slot out so the shard guard is released before locking
        let slot = self
            .diagrams
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ArchError::not_found("diagram", id.as_str()))?;

        let mut guard = lock_diagram(&slot, id);
        f(&mut guard)
    }

    pub fn create_diagram(&self, system_name: &str, description: Option<&str>) -> Result<DiagramId> {
        let id = DiagramId::generate();
        let diagram = C4Diagram::new(id.clone(), system_name, description)?;
        info!(diagram = %id, name = %diagram.name, "Created diagram");
        self.diagrams.insert(id.clone(), Arc::new(Mutex::new(diagram)));
        Ok(id)
    }

    pub fn add_element(&self, id: &DiagramId, new: NewElement) -> Result<String> {
        self.with_diagram(id, |d| {
            let element_id = d.add_element(new)?;
            debug!(diagram = %id, element = %element_id, "Added element");
            Ok(element_id)
        })
    }

    pub fn add_relation(
        &self,
        id: &DiagramId,
        source: &str,
        target: &str,
        label: &str,
        technology: Option<&str>,
    ) -> Result<bool> {
        self.with_diagram(id, |d| d.add_relation(source, target, label, technology))
    }

    pub fn drill_down(&self, id: &DiagramId, element: &str) -> Result<DiagramView> {
        self.with_diagram(id, |d| d.drill_down(element))
    }

    pub fn drill_up(&self, id: &DiagramId) -> Result<DiagramView> {
        self.with_diagram(id, |d| Ok(d.drill_up()))
    }

    pub fn highlight(&self, id: &DiagramId, elements: &[String]) -> Result<DiagramView> {
        self.with_diagram(id, |d| d.highlight(elements))
    }

    pub fn view(&self, id: &DiagramId) -> Result<DiagramView> {
        self.with_diagram(id, |d| Ok(d.view()))
    }

    pub fn root_id(&self, id: &DiagramId) -> Result<String> {
        self.with_diagram(id, |d| Ok(d.root_id.clone()))
    }

    pub fn hierarchy(&self, id: &DiagramId) -> Result<Vec<HierarchyEntry>> {
        self.with_diagram(id, |d| Ok(d.hierarchy()))
    }

    /// Full copy of a diagram
    pub fn snapshot(&self, id: &DiagramId) -> Result<C4Diagram> {
        self.with_diagram(id, |d| Ok(d.clone()))
    }

    pub fn snapshots(&self) -> Vec<C4Diagram> {
        let slots: Vec<(DiagramId, Arc<Mutex<C4Diagram>>)> = self
            .diagrams
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        slots
            .iter()
            .map(|(id, slot)| lock_diagram(slot, id).clone())
            .collect()
    }

    /// Id and name of every diagram, oldest first
    pub fn list(&self) -> Vec<DiagramSummary> {
        let mut summaries: Vec<(chrono::DateTime<chrono::Utc>, DiagramSummary)> = self
            .snapshots()
            .into_iter()
            .map(|d| (d.created_at, d.summary()))
            .collect();
        summaries.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        summaries.into_iter().map(|(_, s)| s).collect()
    }

    /// Insert a previously persisted diagram under its own id
    pub fn restore(&self, diagram: C4Diagram) -> Result<()> {
        diagram.check_integrity()?;
        if self.diagrams.contains_key(&diagram.id) {
            return Err(ArchError::conflict(format!(
                "diagram '{}' is already loaded",
                diagram.id
            )));
        }
        debug!(diagram = %diagram.id, "Restored diagram");
        self.diagrams
            .insert(diagram.id.clone(), Arc::new(Mutex::new(diagram)));
        Ok(())
    }

    pub fn export(&self, id: &DiagramId, format: ExportFormat) -> Result<String> {
        self.with_diagram(id, |d| export(d, format))
    }
}

fn lock_diagram<'a>(slot: &'a Mutex<C4Diagram>, id: &DiagramId) -> MutexGuard<'a, C4Diagram> {
    slot.lock().unwrap_or_else(|poisoned| {
        tracing::error!(diagram = %id, "Diagram mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::c4::model::C4Level;
    use crate::types::ErrorKind;

    #[test]
    fn test_create_and_view() {
        let store = DiagramStore::new();
        let id = store.create_diagram("Shop", None).unwrap();
        let view = store.view(&id).unwrap();
        assert_eq!(view.elements.len(), 1);
        assert_eq!(view.elements[0].name, "Shop");
        assert_eq!(store.root_id(&id).unwrap(), "el-1");
    }

    #[test]
    fn test_unknown_diagram_is_not_found() {
        let store = DiagramStore::new();
        let err = store.view(&DiagramId::new("missing")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_restore_rejects_duplicates() {
        let store = DiagramStore::new();
        let id = store.create_diagram("Shop", None).unwrap();
        let snapshot = store.snapshot(&id).unwrap();
        let err = store.restore(snapshot.clone()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let other = DiagramStore::new();
        other.restore(snapshot).unwrap();
        assert_eq!(other.view(&id).unwrap().diagram_id, id);
    }

    #[test]
    fn test_concurrent_adds_on_one_diagram() {
        let store = Arc::new(DiagramStore::new());
        let id = store.create_diagram("Shop", None).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                let id = id.clone();
                std::thread::spawn(move || {
                    store
                        .add_element(
                            &id,
                            NewElement::new(C4Level::Container, format!("svc-{}", i)).parent("el-1"),
                        )
                        .unwrap()
                })
            })
            .collect();
        let mut ids: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 8);
        assert_eq!(store.snapshot(&id).unwrap().elements.len(), 9);
    }

    #[test]
    fn test_list_is_ordered_by_creation() {
        let store = DiagramStore::new();
        let a = store.create_diagram("A", None).unwrap();
        let b = store.create_diagram("B", None).unwrap();
        let listed: Vec<DiagramId> = store.list().into_iter().map(|s| s.id).collect();
        assert_eq!(listed.len(), 2);
        assert!(listed.contains(&a) && listed.contains(&b));
    }
}
