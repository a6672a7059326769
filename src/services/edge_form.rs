use tracing::debug;

use crate::domain::dependency::{DependencyEdge, PendingEdge};
use crate::domain::graph::GraphStore;
use crate::domain::task::TaskId;
use crate::domain::task_validation::{Field, FormError};
use crate::services::error_handling::EditorError;

/// Create or edit a single dependency. Holds the current selection so a
/// view can bind its two selectors to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeForm {
    pub from: Option<TaskId>,
    pub to: Option<TaskId>,
    /// Set when editing; the pair the form replaces.
    pub existing: Option<DependencyEdge>,
}

impl EdgeForm {
    pub fn create() -> Self {
        Self::default()
    }

    pub fn edit(edge: DependencyEdge) -> Self {
        Self {
            from: Some(edge.from.clone()),
            to: Some(edge.to.clone()),
            existing: Some(edge),
        }
    }

    pub fn from_pending(pending: PendingEdge) -> Self {
        Self {
            from: Some(pending.from),
            to: pending.to,
            existing: None,
        }
    }

    pub fn is_edit(&self) -> bool {
        self.existing.is_some()
    }

    /// Field checks that never need the store.
    pub fn validate_fields(from: Option<&TaskId>, to: Option<&TaskId>) -> Result<(TaskId, TaskId), FormError> {
        let from = from.ok_or_else(|| FormError::new(Field::From, "Select the task that must finish first"))?;
        let to = to.ok_or_else(|| FormError::new(Field::To, "Select the task that depends on it"))?;
        if from == to {
            return Err(FormError::new(Field::To, "A task cannot depend on itself"));
        }
        Ok((from.clone(), to.clone()))
    }

    /// Commits `from -> to`. With `existing`, the old pair is replaced; if
    /// the new pair is rejected the store is left exactly as it was.
    pub fn submit(
        store: &mut GraphStore,
        from: Option<&TaskId>,
        to: Option<&TaskId>,
        existing: Option<&DependencyEdge>,
    ) -> Result<DependencyEdge, EditorError> {
        let (from, to) = Self::validate_fields(from, to)?;

        let Some(old) = existing else {
            return Ok(store.add_edge(&from, &to)?);
        };
        if old.from == from && old.to == to && store.contains_edge(&from, &to) {
            return Ok(old.clone());
        }

        let mut candidate = store.clone();
        candidate.remove_edge(&old.from, &old.to);
        let edge = candidate.add_edge(&from, &to)?;
        *store = candidate;
        debug!(old = %old, new = %edge, "Dependency edited");
        Ok(edge)
    }

    pub fn submit_form(&self, store: &mut GraphStore) -> Result<DependencyEdge, EditorError> {
        Self::submit(store, self.from.as_ref(), self.to.as_ref(), self.existing.as_ref())
    }

    /// Targets the store would accept for `from`, in insertion order. When
    /// editing, the replaced pair does not count against the candidates.
    pub fn candidates(&self, store: &GraphStore) -> Vec<TaskId> {
        let Some(from) = self.from.as_ref() else {
            return Vec::new();
        };
        let mut view = store.clone();
        if let Some(old) = &self.existing {
            view.remove_edge(&old.from, &old.to);
        }
        view.ids()
            .iter()
            .filter(|to| view.check_edge(from, to).is_ok())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::GraphError;
    use crate::domain::task::TaskNode;

    fn id(s: &str) -> TaskId {
        TaskId::from(s)
    }

    fn chain() -> GraphStore {
        let nodes = ["1", "2", "3"].map(|n| TaskNode::new(n, n));
        let edges = [DependencyEdge::new("1", "2"), DependencyEdge::new("2", "3")];
        GraphStore::from_parts(nodes, edges).unwrap()
    }

    #[test]
    fn test_same_from_and_to_rejected_before_store() {
        let mut store = chain();
        let revision = store.revision();

        let err = EdgeForm::submit(&mut store, Some(&id("1")), Some(&id("1")), None).unwrap_err();
        assert!(matches!(err, EditorError::Form(FormError { field: Field::To, .. })));
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_unset_fields() {
        let mut store = chain();
        let err = EdgeForm::submit(&mut store, None, Some(&id("1")), None).unwrap_err();
        assert!(matches!(err, EditorError::Form(FormError { field: Field::From, .. })));

        let err = EdgeForm::submit(&mut store, Some(&id("1")), None, None).unwrap_err();
        assert!(matches!(err, EditorError::Form(FormError { field: Field::To, .. })));
    }

    #[test]
    fn test_create_goes_through_store_validation() {
        let mut store = chain();
        let err = EdgeForm::submit(&mut store, Some(&id("3")), Some(&id("1")), None).unwrap_err();
        assert!(matches!(err, EditorError::Graph(GraphError::Cycle { .. })));

        let edge = EdgeForm::submit(&mut store, Some(&id("1")), Some(&id("3")), None).unwrap();
        assert_eq!(edge, DependencyEdge::new("1", "3"));
        assert_eq!(store.edge_count(), 3);
    }

    #[test]
    fn test_edit_replaces_pair() {
        let mut store = chain();
        let form = EdgeForm {
            from: Some(id("1")),
            to: Some(id("3")),
            existing: Some(DependencyEdge::new("1", "2")),
        };

        form.submit_form(&mut store).unwrap();
        assert!(!store.contains_edge(&id("1"), &id("2")));
        assert!(store.contains_edge(&id("1"), &id("3")));
    }

    #[test]
    fn test_edit_can_reverse_an_edge() {
        // 1 -> 2 reversed becomes legal once the old pair is gone.
        let mut store = chain();
        let old = DependencyEdge::new("1", "2");
        EdgeForm::submit(&mut store, Some(&id("2")), Some(&id("1")), Some(&old)).unwrap();
        assert_eq!(
            store.edges(),
            vec![DependencyEdge::new("2", "1"), DependencyEdge::new("2", "3")]
        );
    }

    #[test]
    fn test_failed_edit_leaves_store_unchanged() {
        let mut store = chain();
        let before = store.edges();
        let revision = store.revision();
        let old = DependencyEdge::new("1", "2");

        let err = EdgeForm::submit(&mut store, Some(&id("3")), Some(&id("2")), Some(&old)).unwrap_err();
        assert!(matches!(err, EditorError::Graph(GraphError::Cycle { .. })));
        assert_eq!(store.edges(), before);
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_candidates_exclude_invalid_targets() {
        let store = chain();
        let form = EdgeForm::from_pending(PendingEdge::from_source(id("3")));
        assert!(form.candidates(&store).is_empty());

        let form = EdgeForm::from_pending(PendingEdge::from_source(id("1")));
        assert_eq!(form.candidates(&store), vec![id("3")]);

        let editing = EdgeForm::edit(DependencyEdge::new("1", "2"));
        assert_eq!(editing.candidates(&store), vec![id("2"), id("3")]);
    }
}
