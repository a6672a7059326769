use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use tracing::debug;

use super::dependency::DependencyEdge;
use super::task::{TaskId, TaskNode, TaskPatch};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Task already exists: {id}")]
    DuplicateId { id: TaskId },

    #[error("Task not found: {id}")]
    NotFound { id: TaskId },

    #[error("A task cannot depend on itself: {id}")]
    SelfLoop { id: TaskId },

    #[error("Dependency already exists: {from} -> {to}")]
    DuplicateEdge { from: TaskId, to: TaskId },

    #[error("Circular dependency detected: {from} -> {to} would close a cycle")]
    Cycle { from: TaskId, to: TaskId },
}

impl GraphError {
    /// Errors a user can cause through the forms or the canvas. Anything
    /// else points at a stale id in the caller.
    pub fn is_validation(&self) -> bool {
        !matches!(self, GraphError::NotFound { .. })
    }
}

/// The nodes and dependency edges of one project.
///
/// Invariants held after every public call, successful or not:
/// every edge references two existing nodes, no `(from, to)` pair appears
/// twice, there are no self-loops and the graph is acyclic.
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    graph: StableDiGraph<TaskId, ()>,
    index: HashMap<TaskId, NodeIndex>,
    tasks: HashMap<TaskId, TaskNode>,
    order: Vec<TaskId>,
    revision: u64,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk load, applying the same checks as the individual operations.
    pub fn from_parts(
        nodes: impl IntoIterator<Item = TaskNode>,
        edges: impl IntoIterator<Item = DependencyEdge>,
    ) -> Result<Self, GraphError> {
        let mut store = Self::new();
        for node in nodes {
            store.add_node(node)?;
        }
        for edge in edges {
            store.add_edge(&edge.from, &edge.to)?;
        }
        Ok(store)
    }

    /// Bumped by every successful mutation.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains_node(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn node(&self, id: &TaskId) -> Option<&TaskNode> {
        self.tasks.get(id)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> + '_ {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    pub fn ids(&self) -> &[TaskId] {
        &self.order
    }

    /// Position of a node in insertion order; used to break ties
    /// deterministically.
    pub fn ordinal(&self, id: &TaskId) -> Option<usize> {
        self.order.iter().position(|other| other == id)
    }

    /// Edges sorted by the insertion order of their source, then target.
    pub fn edges(&self) -> Vec<DependencyEdge> {
        let ordinals = self.ordinals();
        let mut edges: Vec<DependencyEdge> = self
            .graph
            .edge_indices()
            .filter_map(|edge| self.graph.edge_endpoints(edge))
            .map(|(from, to)| DependencyEdge {
                from: self.graph[from].clone(),
                to: self.graph[to].clone(),
            })
            .collect();
        edges.sort_by_key(|edge| (ordinals[&edge.from], ordinals[&edge.to]));
        edges
    }

    pub fn contains_edge(&self, from: &TaskId, to: &TaskId) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(&a), Some(&b)) => self.graph.contains_edge(a, b),
            _ => false,
        }
    }

    /// Tasks that must finish before `id`.
    pub fn dependencies_of(&self, id: &TaskId) -> Vec<TaskId> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Tasks waiting on `id`.
    pub fn dependents_of(&self, id: &TaskId) -> Vec<TaskId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Would `from -> to` be accepted by [`GraphStore::add_edge`]?
    pub fn check_edge(&self, from: &TaskId, to: &TaskId) -> Result<(), GraphError> {
        if from == to {
            return Err(GraphError::SelfLoop { id: from.clone() });
        }
        let from_idx = self.node_index(from)?;
        let to_idx = self.node_index(to)?;

        if self.graph.contains_edge(from_idx, to_idx) {
            return Err(GraphError::DuplicateEdge {
                from: from.clone(),
                to: to.clone(),
            });
        }
        if has_path_connecting(&self.graph, to_idx, from_idx, None) {
            return Err(GraphError::Cycle {
                from: from.clone(),
                to: to.clone(),
            });
        }
        Ok(())
    }

    pub fn add_node(&mut self, task: TaskNode) -> Result<(), GraphError> {
        if self.tasks.contains_key(&task.id) {
            return Err(GraphError::DuplicateId { id: task.id });
        }
        let id = task.id.clone();
        let idx = self.graph.add_node(id.clone());
        self.index.insert(id.clone(), idx);
        self.order.push(id.clone());
        self.tasks.insert(id.clone(), task);
        self.bump();
        debug!(task_id = %id, revision = self.revision, "Task node added");
        Ok(())
    }

    pub fn update_node(&mut self, id: &TaskId, patch: TaskPatch) -> Result<&TaskNode, GraphError> {
        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| GraphError::NotFound { id: id.clone() })?;
        task.apply(patch);
        self.bump();
        debug!(task_id = %id, revision = self.revision, "Task node updated");
        Ok(&self.tasks[id])
    }

    /// Removes the node and every edge touching it in one step.
    pub fn remove_node(&mut self, id: &TaskId) -> Result<(TaskNode, Vec<DependencyEdge>), GraphError> {
        let idx = self.node_index(id)?;
        let removed_edges: Vec<DependencyEdge> = self
            .edges()
            .into_iter()
            .filter(|edge| edge.touches(id))
            .collect();

        self.graph.remove_node(idx);
        self.index.remove(id);
        self.order.retain(|other| other != id);
        let task = self
            .tasks
            .remove(id)
            .ok_or_else(|| GraphError::NotFound { id: id.clone() })?;
        self.bump();
        debug!(
            task_id = %id,
            cascaded_edges = removed_edges.len(),
            revision = self.revision,
            "Task node removed"
        );
        Ok((task, removed_edges))
    }

    pub fn add_edge(&mut self, from: &TaskId, to: &TaskId) -> Result<DependencyEdge, GraphError> {
        self.check_edge(from, to)?;
        let from_idx = self.node_index(from)?;
        let to_idx = self.node_index(to)?;
        self.graph.add_edge(from_idx, to_idx, ());
        self.bump();
        debug!(from = %from, to = %to, revision = self.revision, "Dependency added");
        Ok(DependencyEdge::new(from.clone(), to.clone()))
    }

    /// Removing an edge that does not exist is a no-op; the return value
    /// tells whether anything was removed.
    pub fn remove_edge(&mut self, from: &TaskId, to: &TaskId) -> bool {
        let edge = match (self.index.get(from), self.index.get(to)) {
            (Some(&a), Some(&b)) => self.graph.find_edge(a, b),
            _ => None,
        };
        match edge {
            Some(edge) => {
                self.graph.remove_edge(edge);
                self.bump();
                debug!(from = %from, to = %to, revision = self.revision, "Dependency removed");
                true
            }
            None => false,
        }
    }

    /// Kahn's algorithm, seeded and drained in insertion order so the
    /// result is stable for a given store.
    pub fn topological_order(&self) -> Vec<TaskId> {
        let mut in_degree: HashMap<TaskId, usize> = self
            .order
            .iter()
            .map(|id| (id.clone(), self.dependencies_of(id).len()))
            .collect();
        let mut queue: VecDeque<TaskId> = self
            .order
            .iter()
            .filter(|id| in_degree[*id] == 0)
            .cloned()
            .collect();
        let mut sorted = Vec::with_capacity(self.order.len());

        while let Some(id) = queue.pop_front() {
            for dependent in self.dependents_of(&id) {
                if let Some(degree) = in_degree.get_mut(&dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
            sorted.push(id);
        }
        sorted
    }

    fn node_index(&self, id: &TaskId) -> Result<NodeIndex, GraphError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::NotFound { id: id.clone() })
    }

    fn neighbors(&self, id: &TaskId, direction: Direction) -> Vec<TaskId> {
        let Some(&idx) = self.index.get(id) else {
            return Vec::new();
        };
        let ordinals = self.ordinals();
        let mut ids: Vec<TaskId> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].clone())
            .collect();
        ids.sort_by_key(|other| ordinals[other]);
        ids
    }

    fn ordinals(&self) -> HashMap<&TaskId, usize> {
        self.order.iter().enumerate().map(|(i, id)| (id, i)).collect()
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TaskId {
        TaskId::from(s)
    }

    fn store_with(ids: &[&str]) -> GraphStore {
        let mut store = GraphStore::new();
        for &task in ids {
            store.add_node(TaskNode::new(task, format!("Task {task}"))).unwrap();
        }
        store
    }

    #[test]
    fn test_add_node_rejects_duplicate_id() {
        let mut store = store_with(&["1"]);
        let revision = store.revision();

        let err = store.add_node(TaskNode::new("1", "Again")).unwrap_err();
        assert_eq!(err, GraphError::DuplicateId { id: id("1") });
        assert_eq!(store.len(), 1);
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn test_update_node() {
        let mut store = store_with(&["1"]);
        let revision = store.revision();
        let updated = store.update_node(&id("1"), TaskPatch::name("Renamed")).unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(store.revision(), revision + 1);

        let err = store.update_node(&id("9"), TaskPatch::name("x")).unwrap_err();
        assert_eq!(err, GraphError::NotFound { id: id("9") });
        assert!(!err.is_validation());
        assert_eq!(store.revision(), revision + 1);
    }

    #[test]
    fn test_add_edge_rejections() {
        let mut store = store_with(&["A", "B", "C"]);
        store.add_edge(&id("A"), &id("B")).unwrap();
        store.add_edge(&id("B"), &id("C")).unwrap();

        assert_eq!(
            store.add_edge(&id("A"), &id("A")),
            Err(GraphError::SelfLoop { id: id("A") })
        );
        assert_eq!(
            store.add_edge(&id("A"), &id("B")),
            Err(GraphError::DuplicateEdge { from: id("A"), to: id("B") })
        );
        assert_eq!(
            store.add_edge(&id("C"), &id("A")),
            Err(GraphError::Cycle { from: id("C"), to: id("A") })
        );
        assert_eq!(
            store.add_edge(&id("A"), &id("Z")),
            Err(GraphError::NotFound { id: id("Z") })
        );

        assert_eq!(
            store.edges(),
            vec![DependencyEdge::new("A", "B"), DependencyEdge::new("B", "C")]
        );
    }

    #[test]
    fn test_remove_node_cascades_edges() {
        let mut store = store_with(&["1", "2", "3"]);
        store.add_edge(&id("1"), &id("2")).unwrap();
        store.add_edge(&id("2"), &id("3")).unwrap();

        let (task, removed) = store.remove_node(&id("2")).unwrap();
        assert_eq!(task.id, id("2"));
        assert_eq!(removed.len(), 2);

        let remaining: Vec<&str> = store.nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(remaining, vec!["1", "3"]);
        assert!(store.edges().is_empty());
        assert!(store.dependents_of(&id("1")).is_empty());
    }

    #[test]
    fn test_remove_edge_absent_is_noop() {
        let mut store = store_with(&["1", "2"]);
        let revision = store.revision();

        assert!(!store.remove_edge(&id("1"), &id("2")));
        assert!(!store.remove_edge(&id("1"), &id("missing")));
        assert_eq!(store.revision(), revision);

        store.add_edge(&id("1"), &id("2")).unwrap();
        assert!(store.remove_edge(&id("1"), &id("2")));
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn test_node_slot_reuse_keeps_insertion_order() {
        let mut store = store_with(&["1", "2", "3"]);
        store.remove_node(&id("1")).unwrap();
        store.add_node(TaskNode::new("4", "Task 4")).unwrap();
        store.add_edge(&id("4"), &id("2")).unwrap();
        store.add_edge(&id("2"), &id("3")).unwrap();

        let ids: Vec<&str> = store.ids().iter().map(|t| t.as_str()).collect();
        assert_eq!(ids, vec!["2", "3", "4"]);
        assert_eq!(
            store.edges(),
            vec![DependencyEdge::new("2", "3"), DependencyEdge::new("4", "2")]
        );
    }

    #[test]
    fn test_topological_order() {
        let mut store = store_with(&["c", "b", "a", "d"]);
        store.add_edge(&id("a"), &id("b")).unwrap();
        store.add_edge(&id("b"), &id("c")).unwrap();

        let order: Vec<String> = store
            .topological_order()
            .into_iter()
            .map(|t| t.to_string())
            .collect();
        assert_eq!(order, vec!["a", "d", "b", "c"]);
    }

    #[test]
    fn test_from_parts_validates() {
        let nodes = vec![TaskNode::new("1", "One"), TaskNode::new("2", "Two")];
        let edges = vec![DependencyEdge::new("1", "2"), DependencyEdge::new("2", "1")];

        let err = GraphStore::from_parts(nodes, edges).unwrap_err();
        assert!(matches!(err, GraphError::Cycle { .. }));
    }

    #[test]
    fn test_dependencies_and_dependents() {
        let mut store = store_with(&["1", "2", "3"]);
        store.add_edge(&id("1"), &id("3")).unwrap();
        store.add_edge(&id("2"), &id("3")).unwrap();

        assert_eq!(store.dependencies_of(&id("3")), vec![id("1"), id("2")]);
        assert_eq!(store.dependents_of(&id("1")), vec![id("3")]);
        assert!(store.dependencies_of(&id("missing")).is_empty());
    }
}
