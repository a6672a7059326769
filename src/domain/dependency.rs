use serde::{Deserialize, Serialize};
use std::fmt;

use super::task::TaskId;

/// `from` must complete before `to` can start.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: TaskId,
    pub to: TaskId,
}

impl DependencyEdge {
    pub fn new(from: impl Into<TaskId>, to: impl Into<TaskId>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn touches(&self, id: &TaskId) -> bool {
        &self.from == id || &self.to == id
    }
}

impl fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// An edge that has been proposed but not committed yet. The target stays
/// empty while the user is still drawing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdge {
    pub from: TaskId,
    pub to: Option<TaskId>,
}

impl PendingEdge {
    pub fn from_source(from: TaskId) -> Self {
        Self { from, to: None }
    }

    pub fn with_target(mut self, to: TaskId) -> Self {
        self.to = Some(to);
        self
    }

    /// The committed edge, once both ends are known.
    pub fn promote(self) -> Option<DependencyEdge> {
        let to = self.to?;
        Some(DependencyEdge { from: self.from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_edge_needs_target_to_promote() {
        let pending = PendingEdge::from_source(TaskId::from("1"));
        assert!(pending.clone().promote().is_none());

        let edge = pending.with_target(TaskId::from("2")).promote().unwrap();
        assert_eq!(edge, DependencyEdge::new("1", "2"));
    }

    #[test]
    fn test_edge_display_and_touches() {
        let edge = DependencyEdge::new("a", "b");
        assert_eq!(edge.to_string(), "a -> b");
        assert!(edge.touches(&TaskId::from("b")));
        assert!(!edge.touches(&TaskId::from("c")));
    }
}
