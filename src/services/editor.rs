use chrono::TimeZone;
use std::fmt;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::EditorConfig;
use crate::domain::dependency::DependencyEdge;
use crate::domain::graph::{GraphError, GraphStore};
use crate::domain::task::{TaskId, TaskNode, TaskPatch};
use crate::services::canvas::{Canvas, CanvasOutcome};
use crate::services::edge_form::EdgeForm;
use crate::services::error_handling::EditorError;
use crate::services::layout::{LayeredLayout, Layout, LayoutCache, LayoutEngine, Position};
use crate::services::notifications::NotificationCenter;
use crate::services::task_form::{TaskDraft, TaskForm};

/// One persisted mutation. Saving a form may produce several.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    CreateTask(TaskNode),
    /// Carries the task as it should look afterwards.
    UpdateTask(TaskNode),
    /// Edges touching the task go with it.
    DeleteTask(TaskId),
    AddEdge(DependencyEdge),
    RemoveEdge(DependencyEdge),
}

impl Change {
    pub fn apply(&self, store: &mut GraphStore) -> Result<(), GraphError> {
        match self {
            Change::CreateTask(task) => store.add_node(task.clone()),
            Change::UpdateTask(task) => {
                let current = store
                    .node(&task.id)
                    .ok_or_else(|| GraphError::NotFound { id: task.id.clone() })?;
                let patch = TaskPatch::diff(current, task);
                if !patch.is_empty() {
                    store.update_node(&task.id, patch)?;
                }
                Ok(())
            }
            Change::DeleteTask(id) => store.remove_node(id).map(drop),
            Change::AddEdge(edge) => store.add_edge(&edge.from, &edge.to).map(drop),
            Change::RemoveEdge(edge) => {
                store.remove_edge(&edge.from, &edge.to);
                Ok(())
            }
        }
    }

    /// Changes that turn `before` into `after`, ordered so each one is
    /// valid when applied in sequence: task creates and updates in the
    /// order of `after`, then edge removals, deletes, and edge additions.
    pub fn diff(before: &GraphStore, after: &GraphStore) -> Vec<Change> {
        let mut changes = Vec::new();

        for task in after.nodes() {
            match before.node(&task.id) {
                None => changes.push(Change::CreateTask(task.clone())),
                Some(old) if old != task => changes.push(Change::UpdateTask(task.clone())),
                Some(_) => {}
            }
        }

        let before_edges = before.edges();
        let after_edges = after.edges();
        for edge in &before_edges {
            // Edges of deleted tasks are dropped by the delete itself.
            if !after_edges.contains(edge) && after.contains_node(&edge.from) && after.contains_node(&edge.to) {
                changes.push(Change::RemoveEdge(edge.clone()));
            }
        }
        for task in before.nodes() {
            if !after.contains_node(&task.id) {
                changes.push(Change::DeleteTask(task.id.clone()));
            }
        }
        for edge in after_edges {
            if !before_edges.contains(&edge) {
                changes.push(Change::AddEdge(edge));
            }
        }
        changes
    }

    /// Applies every change to a copy of `store`, replacing it only if all
    /// of them succeed.
    pub fn apply_all(store: &mut GraphStore, changes: &[Change]) -> Result<(), GraphError> {
        let mut candidate = store.clone();
        for change in changes {
            change.apply(&mut candidate)?;
        }
        *store = candidate;
        Ok(())
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::CreateTask(task) => write!(f, "create task {}", task.id),
            Change::UpdateTask(task) => write!(f, "update task {}", task.id),
            Change::DeleteTask(id) => write!(f, "delete task {}", id),
            Change::AddEdge(edge) => write!(f, "add dependency {}", edge),
            Change::RemoveEdge(edge) => write!(f, "remove dependency {}", edge),
        }
    }
}

/// Editor state for one open project: the graph, its cached layout, the
/// canvas interaction and the notification stack.
///
/// The `plan_*` methods validate against a copy and never touch the store;
/// [`Editor::apply`] commits a plan. The plain operations do both and are
/// what a host without a backend uses.
pub struct Editor {
    project_id: String,
    store: GraphStore,
    engine: Box<dyn LayoutEngine>,
    cache: LayoutCache,
    canvas: Canvas,
    notifications: NotificationCenter,
    auth_required: bool,
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("project_id", &self.project_id)
            .field("tasks", &self.store.len())
            .field("revision", &self.store.revision())
            .field("interaction", self.canvas.interaction())
            .finish_non_exhaustive()
    }
}

impl Editor {
    pub fn new(project_id: impl Into<String>, store: GraphStore) -> Self {
        Self::with_config(project_id, store, &EditorConfig::default())
    }

    pub fn with_config(project_id: impl Into<String>, store: GraphStore, config: &EditorConfig) -> Self {
        Self {
            project_id: project_id.into(),
            store,
            engine: Box::new(LayeredLayout::new(config.layout.clone())),
            cache: LayoutCache::new(),
            canvas: Canvas::new(config.drag_threshold),
            notifications: NotificationCenter::new(
                config.notifications.timeout(),
                config.notifications.max_visible,
            ),
            auth_required: false,
        }
    }

    pub fn with_engine(mut self, engine: Box<dyn LayoutEngine>) -> Self {
        self.engine = engine;
        self.cache.invalidate();
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    /// Swaps in a freshly loaded graph. Layout and dragged positions are
    /// recomputed even if the revision happens to match.
    pub fn replace_store(&mut self, store: GraphStore) {
        self.store = store;
        self.cache.invalidate();
        self.canvas.invalidate();
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut NotificationCenter {
        &mut self.notifications
    }

    /// Set after a 401; the host should send the user to log in.
    pub fn auth_required(&self) -> bool {
        self.auth_required
    }

    pub fn clear_auth_required(&mut self) {
        self.auth_required = false;
    }

    /// Brings overrides, the cached layout and the viewport frame up to
    /// date with the store.
    fn sync_layout(&mut self) -> &Layout {
        self.canvas.sync(&self.store);
        let layout = self.cache.get_or_compute(&self.store, self.engine.as_ref());
        self.canvas.viewport.frame(layout.bounds());
        layout
    }

    pub fn layout(&mut self) -> &Layout {
        self.sync_layout()
    }

    /// Node centres as displayed, including dragged nodes.
    pub fn positions(&mut self) -> Vec<(TaskId, Position)> {
        self.sync_layout();
        let layout = self.cache.get_or_compute(&self.store, self.engine.as_ref());
        self.canvas.positions(layout)
    }

    pub fn selected_task(&self) -> Option<&TaskNode> {
        self.canvas.selected().and_then(|id| self.store.node(id))
    }

    pub fn plan_task_save<Tz: TimeZone>(&self, draft: &TaskDraft, tz: &Tz) -> Result<(TaskId, Vec<Change>), EditorError> {
        let mut candidate = self.store.clone();
        let id = TaskForm::save(&mut candidate, draft, tz)?;
        Ok((id, Change::diff(&self.store, &candidate)))
    }

    pub fn plan_delete_task(&self, id: &TaskId) -> Result<Vec<Change>, EditorError> {
        if !self.store.contains_node(id) {
            return Err(GraphError::NotFound { id: id.clone() }.into());
        }
        Ok(vec![Change::DeleteTask(id.clone())])
    }

    pub fn plan_edge(&self, form: &EdgeForm) -> Result<(DependencyEdge, Vec<Change>), EditorError> {
        let mut candidate = self.store.clone();
        let edge = form.submit_form(&mut candidate)?;
        Ok((edge, Change::diff(&self.store, &candidate)))
    }

    /// Re-checks an edge proposed by the canvas against the current graph,
    /// which may have changed since the gesture ended.
    pub fn plan_connect(&self, edge: &DependencyEdge) -> Result<Vec<Change>, EditorError> {
        self.store.check_edge(&edge.from, &edge.to)?;
        Ok(vec![Change::AddEdge(edge.clone())])
    }

    /// Empty when the pair is not in the graph.
    pub fn plan_remove_edge(&self, edge: &DependencyEdge) -> Vec<Change> {
        if self.store.contains_edge(&edge.from, &edge.to) {
            vec![Change::RemoveEdge(edge.clone())]
        } else {
            debug!(edge = %edge, "Dependency already absent");
            Vec::new()
        }
    }

    /// Commits a plan against the current graph, all or nothing.
    pub fn apply(&mut self, changes: &[Change]) -> Result<(), EditorError> {
        Change::apply_all(&mut self.store, changes)?;
        debug!(
            project_id = %self.project_id,
            changes = changes.len(),
            revision = self.store.revision(),
            "Changes applied"
        );
        Ok(())
    }

    pub fn save_task<Tz: TimeZone>(&mut self, draft: &TaskDraft, tz: &Tz) -> Result<TaskId, EditorError> {
        let created = draft.id.as_ref().is_none_or(|id| !self.store.contains_node(id));
        let result = self
            .plan_task_save(draft, tz)
            .and_then(|(id, changes)| self.apply(&changes).map(|_| id));
        match result {
            Ok(id) => {
                self.notify_saved(created, &draft.name);
                Ok(id)
            }
            Err(err) => Err(self.report("save_task", err)),
        }
    }

    pub fn delete_task(&mut self, id: &TaskId) -> Result<(), EditorError> {
        let result = self.plan_delete_task(id).and_then(|changes| self.apply(&changes));
        match result {
            Ok(()) => {
                self.notify_deleted(id);
                Ok(())
            }
            Err(err) => Err(self.report("delete_task", err)),
        }
    }

    pub fn submit_edge(&mut self, form: &EdgeForm) -> Result<DependencyEdge, EditorError> {
        let result = self
            .plan_edge(form)
            .and_then(|(edge, changes)| self.apply(&changes).map(|_| edge));
        result.map_err(|err| self.report("submit_edge", err))
    }

    /// Returns whether the pair was present.
    pub fn remove_edge(&mut self, edge: &DependencyEdge) -> bool {
        let changes = self.plan_remove_edge(edge);
        !changes.is_empty() && self.apply(&changes).is_ok()
    }

    /// Pointer press in screen coordinates.
    pub fn pointer_down(&mut self, screen: Position) -> CanvasOutcome {
        self.sync_layout();
        let at = self.canvas.viewport.to_canvas(screen);
        let layout = self.cache.get_or_compute(&self.store, self.engine.as_ref());
        self.canvas.pointer_down_at(layout, at)
    }

    pub fn pointer_move(&mut self, screen: Position) {
        let at = self.canvas.viewport.to_canvas(screen);
        self.canvas.pointer_move(at);
    }

    /// Ends the gesture. A rejected dependency is reported and turned
    /// into [`CanvasOutcome::EdgeDiscarded`]; a proposed one still has to
    /// be committed by the caller.
    pub fn pointer_up(&mut self, screen: Position) -> CanvasOutcome {
        self.sync_layout();
        let at = self.canvas.viewport.to_canvas(screen);
        let layout = self.cache.get_or_compute(&self.store, self.engine.as_ref());
        match self.canvas.pointer_up_at(layout, at, &self.store) {
            Ok(outcome) => outcome,
            Err(err) => {
                self.report("connect_tasks", err);
                CanvasOutcome::EdgeDiscarded
            }
        }
    }

    /// Commits an edge proposed by the canvas straight into the store.
    pub fn commit_outcome(&mut self, outcome: &CanvasOutcome) -> Option<DependencyEdge> {
        let CanvasOutcome::EdgeProposed(edge) = outcome else {
            return None;
        };
        match self.apply(&[Change::AddEdge(edge.clone())]) {
            Ok(()) => Some(edge.clone()),
            Err(err) => {
                self.report("connect_tasks", err);
                None
            }
        }
    }

    /// Logs the error and raises a notification for it. Returns the error
    /// so callers can keep it for inline display.
    pub fn report(&mut self, operation: &str, err: EditorError) -> EditorError {
        err.log(operation);
        if err.is_unauthorized() {
            self.auth_required = true;
        }
        self.notifications
            .push(err.notification_kind(), err.title(), err.user_message(), Instant::now());
        err
    }

    pub fn notify_saved(&mut self, created: bool, name: &str) {
        let title = if created { "Task created" } else { "Task updated" };
        info!(project_id = %self.project_id, task = %name.trim(), "{}", title);
        self.notifications.success(title, format!("\"{}\" was saved.", name.trim()));
    }

    pub fn notify_deleted(&mut self, id: &TaskId) {
        info!(project_id = %self.project_id, task_id = %id, "Task deleted");
        self.notifications.success("Task deleted", "The task and its dependencies were removed.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task_validation::{Field, FormError};
    use crate::services::canvas::Interaction;
    use crate::services::notifications::NotificationKind;
    use chrono::Utc;

    fn id(s: &str) -> TaskId {
        TaskId::from(s)
    }

    fn editor_with(nodes: &[&str], edges: &[(&str, &str)]) -> Editor {
        let store = GraphStore::from_parts(
            nodes.iter().map(|n| TaskNode::new(*n, *n)),
            edges.iter().map(|(a, b)| DependencyEdge::new(*a, *b)),
        )
        .unwrap();
        Editor::new("p", store)
    }

    #[test]
    fn test_diff_orders_changes() {
        let before = GraphStore::from_parts(
            ["1", "2", "3"].map(|n| TaskNode::new(n, n)),
            [DependencyEdge::new("1", "2"), DependencyEdge::new("2", "3")],
        )
        .unwrap();
        let mut after = before.clone();
        after.remove_node(&id("2")).unwrap();
        after.add_node(TaskNode::new("4", "4")).unwrap();
        after.add_edge(&id("4"), &id("1")).unwrap();
        after.update_node(&id("3"), TaskPatch::name("Three")).unwrap();

        let changes = Change::diff(&before, &after);
        assert!(matches!(&changes[0], Change::UpdateTask(t) if t.name == "Three"));
        assert!(matches!(&changes[1], Change::CreateTask(t) if t.id == id("4")));
        assert_eq!(changes[2], Change::DeleteTask(id("2")));
        assert_eq!(changes[3], Change::AddEdge(DependencyEdge::new("4", "1")));
        assert_eq!(changes.len(), 4);

        let mut replay = before.clone();
        Change::apply_all(&mut replay, &changes).unwrap();
        assert_eq!(replay.edges(), after.edges());
        assert_eq!(replay.len(), after.len());
    }

    #[test]
    fn test_plans_do_not_mutate() {
        let editor = editor_with(&["1", "2"], &[]);
        let (new_id, changes) = editor
            .plan_task_save(&TaskDraft::new("Ship").depends_on("2"), &Utc)
            .unwrap();

        assert_eq!(changes.len(), 2);
        assert!(matches!(&changes[0], Change::CreateTask(t) if t.id == new_id));
        assert_eq!(changes[1], Change::AddEdge(DependencyEdge::new(id("2"), new_id)));
        assert_eq!(editor.store().len(), 2);
        assert_eq!(editor.store().revision(), 2);
    }

    #[test]
    fn test_apply_is_all_or_nothing() {
        let mut editor = editor_with(&["A", "B"], &[("A", "B")]);
        let revision = editor.store().revision();

        let err = editor
            .apply(&[
                Change::CreateTask(TaskNode::new("C", "C")),
                Change::AddEdge(DependencyEdge::new("B", "A")),
            ])
            .unwrap_err();

        assert!(matches!(err, EditorError::Graph(GraphError::Cycle { .. })));
        assert!(!editor.store().contains_node(&id("C")));
        assert_eq!(editor.store().revision(), revision);
    }

    #[test]
    fn test_empty_name_reports_warning() {
        let mut editor = editor_with(&[], &[]);
        let err = editor.save_task(&TaskDraft::new("   "), &Utc).unwrap_err();

        assert!(matches!(err, EditorError::Form(FormError { field: Field::Name, .. })));
        assert!(editor.store().is_empty());
        let notification = editor.notifications().active().next().unwrap();
        assert_eq!(notification.kind, NotificationKind::Warning);
    }

    #[test]
    fn test_save_and_delete_notify_success() {
        let mut editor = editor_with(&[], &[]);
        let task = editor.save_task(&TaskDraft::new("Plan"), &Utc).unwrap();
        editor.delete_task(&task).unwrap();

        let titles: Vec<_> = editor.notifications().active().map(|n| n.title.clone()).collect();
        assert_eq!(titles, vec!["Task created", "Task deleted"]);
        assert!(editor.store().is_empty());
    }

    #[test]
    fn test_delete_cascades_edges() {
        let mut editor = editor_with(&["1", "2", "3"], &[("1", "2"), ("2", "3")]);
        editor.delete_task(&id("2")).unwrap();

        assert_eq!(editor.store().ids(), &[id("1"), id("3")]);
        assert!(editor.store().edges().is_empty());
    }

    #[test]
    fn test_delete_missing_task_reports_error() {
        let mut editor = editor_with(&["1"], &[]);
        let err = editor.delete_task(&id("9")).unwrap_err();

        assert!(!err.is_validation());
        assert_eq!(editor.notifications().active().next().unwrap().kind, NotificationKind::Error);
    }

    #[test]
    fn test_remove_absent_edge_is_noop() {
        let mut editor = editor_with(&["1", "2"], &[("1", "2")]);
        let revision = editor.store().revision();

        assert!(!editor.remove_edge(&DependencyEdge::new("2", "1")));
        assert_eq!(editor.store().revision(), revision);
        assert!(editor.notifications().is_empty());

        assert!(editor.remove_edge(&DependencyEdge::new("1", "2")));
        assert_eq!(editor.store().edge_count(), 0);
    }

    #[test]
    fn test_dragging_cycle_is_rejected() {
        let mut editor = editor_with(&["A", "B", "C"], &[("A", "B"), ("B", "C")]);
        let layout = editor.layout().clone();
        let screen = |p: Position| editor.canvas().viewport.to_screen(p);
        let (_, c_output) = layout.handles(layout.position(&id("C")).unwrap());
        let (a_input, _) = layout.handles(layout.position(&id("A")).unwrap());
        let (c_output, a_input) = (screen(c_output), screen(a_input));

        editor.pointer_down(c_output);
        assert!(matches!(editor.canvas().interaction(), Interaction::DrawingEdge { .. }));
        editor.pointer_move(a_input);
        let outcome = editor.pointer_up(a_input);

        assert_eq!(outcome, CanvasOutcome::EdgeDiscarded);
        assert_eq!(
            editor.store().edges(),
            vec![DependencyEdge::new("A", "B"), DependencyEdge::new("B", "C")]
        );
        let notification = editor.notifications().active().next().unwrap();
        assert_eq!(notification.title, "Circular dependency");
    }

    #[test]
    fn test_dragging_valid_edge_commits() {
        let mut editor = editor_with(&["A", "B", "C"], &[("A", "B")]);
        let layout = editor.layout().clone();
        let screen = |p: Position| editor.canvas().viewport.to_screen(p);
        let (_, a_output) = layout.handles(layout.position(&id("A")).unwrap());
        let (c_input, _) = layout.handles(layout.position(&id("C")).unwrap());
        let (a_output, c_input) = (screen(a_output), screen(c_input));

        editor.pointer_down(a_output);
        let outcome = editor.pointer_up(c_input);
        assert_eq!(outcome, CanvasOutcome::EdgeProposed(DependencyEdge::new("A", "C")));

        assert_eq!(editor.commit_outcome(&outcome), Some(DependencyEdge::new("A", "C")));
        assert!(editor.store().contains_edge(&id("A"), &id("C")));
    }

    #[test]
    fn test_replace_store_recomputes_layout() {
        let mut editor = editor_with(&["A"], &[]);
        assert_eq!(editor.layout().len(), 1);

        let reloaded = GraphStore::from_parts(["X", "Y"].map(|n| TaskNode::new(n, n)), []).unwrap();
        editor.replace_store(reloaded);
        assert_eq!(editor.layout().len(), 2);
    }
}
