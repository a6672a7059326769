use chrono::TimeZone;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::EditorConfig;
use crate::domain::dependency::DependencyEdge;
use crate::domain::graph::GraphStore;
use crate::domain::task::{TaskId, TaskNode};
use crate::repository::TaskBackend;
use crate::services::canvas::CanvasOutcome;
use crate::services::edge_form::EdgeForm;
use crate::services::editor::{Change, Editor};
use crate::services::error_handling::EditorError;
use crate::services::task_form::TaskDraft;

/// How often the notification reaper looks again when nothing is visible.
const REAPER_IDLE_POLL: Duration = Duration::from_millis(250);

/// An open project backed by persistent storage.
///
/// Every mutation is planned against the current graph, sent to the
/// backend, and only then applied in memory. A failed request leaves the
/// graph exactly as it was. Once [`WorkspaceSession::close`] has been
/// called, requests still in flight complete without touching the editor.
#[derive(Clone)]
pub struct WorkspaceSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    project_id: String,
    editor: Mutex<Editor>,
    backend: Arc<dyn TaskBackend>,
    closed: AtomicBool,
}

impl PartialEq for WorkspaceSession {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for WorkspaceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceSession")
            .field("project_id", &self.inner.project_id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl WorkspaceSession {
    pub async fn open(
        project_id: impl Into<String>,
        backend: Arc<dyn TaskBackend>,
        config: &EditorConfig,
    ) -> Result<Self, EditorError> {
        let project_id = project_id.into();
        let (store, skipped) = fetch_store(backend.as_ref(), &project_id).await?;
        info!(
            project_id = %project_id,
            tasks = store.len(),
            dependencies = store.edge_count(),
            "Workspace opened"
        );

        let mut editor = Editor::with_config(project_id.clone(), store, config);
        if skipped > 0 {
            editor.notifications_mut().warning(
                "Some data was ignored",
                format!("{} invalid tasks or dependencies were skipped while loading.", skipped),
            );
        }

        Ok(Self {
            inner: Arc::new(SessionInner {
                project_id,
                editor: Mutex::new(editor),
                backend,
                closed: AtomicBool::new(false),
            }),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.inner.project_id
    }

    /// Runs `f` with the editor locked. Never hold on to the lock across
    /// an await point.
    pub fn with_editor<R>(&self, f: impl FnOnce(&mut Editor) -> R) -> R {
        f(&mut self.inner.editor.lock())
    }

    /// Detaches the session from its view.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            info!(project_id = %self.inner.project_id, "Workspace closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Replaces the graph with what the backend currently holds.
    pub async fn reload(&self) -> Result<(), EditorError> {
        let (store, _) = fetch_store(self.inner.backend.as_ref(), &self.inner.project_id).await?;
        if self.is_closed() {
            return Ok(());
        }
        self.with_editor(|editor| editor.replace_store(store));
        Ok(())
    }

    pub async fn save_task<Tz: TimeZone>(&self, draft: &TaskDraft, tz: &Tz) -> Result<TaskId, EditorError> {
        let (created, plan) = self.with_editor(|editor| {
            let created = draft.id.as_ref().is_none_or(|id| !editor.store().contains_node(id));
            (created, editor.plan_task_save(draft, tz))
        });
        let result = match plan {
            Ok((id, changes)) => self.run(changes).await.map(|_| id),
            Err(err) => Err(err),
        };
        self.finish("save_task", result, |editor| editor.notify_saved(created, &draft.name))
    }

    pub async fn delete_task(&self, id: &TaskId) -> Result<(), EditorError> {
        let result = match self.with_editor(|editor| editor.plan_delete_task(id)) {
            Ok(changes) => self.run(changes).await,
            Err(err) => Err(err),
        };
        self.finish("delete_task", result, |editor| editor.notify_deleted(id))
    }

    pub async fn submit_edge(&self, form: &EdgeForm) -> Result<DependencyEdge, EditorError> {
        let result = match self.with_editor(|editor| editor.plan_edge(form)) {
            Ok((edge, changes)) => self.run(changes).await.map(|_| edge),
            Err(err) => Err(err),
        };
        self.finish("submit_edge", result, |_| {})
    }

    /// Returns whether the pair was present.
    pub async fn remove_edge(&self, edge: &DependencyEdge) -> Result<bool, EditorError> {
        let changes = self.with_editor(|editor| editor.plan_remove_edge(edge));
        if changes.is_empty() {
            return Ok(false);
        }
        let result = self.run(changes).await.map(|_| true);
        self.finish("remove_edge", result, |_| {})
    }

    /// Persists a dependency drawn on the canvas.
    pub async fn connect(&self, outcome: &CanvasOutcome) -> Result<Option<DependencyEdge>, EditorError> {
        let CanvasOutcome::EdgeProposed(edge) = outcome else {
            return Ok(None);
        };
        let result = match self.with_editor(|editor| editor.plan_connect(edge)) {
            Ok(changes) => self.run(changes).await.map(|_| Some(edge.clone())),
            Err(err) => Err(err),
        };
        self.finish("connect_tasks", result, |_| {})
    }

    /// Expires notifications on time until the session is closed.
    pub fn spawn_notification_reaper(&self) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move {
            while !session.is_closed() {
                let deadline = session.with_editor(|editor| editor.notifications().next_deadline());
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => tokio::time::sleep(REAPER_IDLE_POLL).await,
                }
                let expired = session.with_editor(|editor| editor.notifications_mut().expire(Instant::now()));
                if expired > 0 {
                    debug!(expired, "Notifications expired");
                }
            }
        })
    }

    async fn run(&self, changes: Vec<Change>) -> Result<(), EditorError> {
        for (sent, change) in changes.iter().enumerate() {
            if let Err(err) = self.send(change).await {
                if sent > 0 {
                    warn!(
                        project_id = %self.inner.project_id,
                        sent,
                        failed = %change,
                        "Backend applied part of the change; reloading"
                    );
                    self.reload_quietly().await;
                }
                return Err(err);
            }
        }

        if self.is_closed() {
            debug!(project_id = %self.inner.project_id, "Session closed; dropping completed change");
            return Ok(());
        }
        let applied = self.inner.editor.lock().apply(&changes);
        if applied.is_err() {
            // The graph moved on while the request was in flight.
            self.reload_quietly().await;
        }
        applied
    }

    async fn send(&self, change: &Change) -> Result<(), EditorError> {
        let backend = self.inner.backend.as_ref();
        let project_id = self.inner.project_id.as_str();
        let result = match change {
            Change::CreateTask(task) => backend.create_task(project_id, task).await,
            Change::UpdateTask(task) => backend.update_task(project_id, task).await,
            Change::DeleteTask(id) => backend.delete_task(project_id, id).await,
            Change::AddEdge(edge) => backend.create_dependency(project_id, edge).await,
            Change::RemoveEdge(edge) => backend.delete_dependency(project_id, edge).await,
        };
        Ok(result?)
    }

    async fn reload_quietly(&self) {
        if let Err(err) = self.reload().await {
            err.log("reload");
        }
    }

    fn finish<T>(
        &self,
        operation: &str,
        result: Result<T, EditorError>,
        on_success: impl FnOnce(&mut Editor),
    ) -> Result<T, EditorError> {
        if self.is_closed() {
            if let Err(err) = &result {
                err.log(operation);
            }
            return result;
        }
        self.with_editor(|editor| match result {
            Ok(value) => {
                on_success(editor);
                Ok(value)
            }
            Err(err) => Err(editor.report(operation, err)),
        })
    }
}

/// Loads a project, skipping records the graph would reject.
async fn fetch_store(backend: &dyn TaskBackend, project_id: &str) -> Result<(GraphStore, usize), EditorError> {
    let tasks: Vec<TaskNode> = backend.list_tasks(project_id).await?;
    let edges = backend.list_dependencies(project_id).await?;

    let mut store = GraphStore::new();
    let mut skipped = 0;
    for task in tasks {
        let id = task.id.clone();
        if let Err(err) = store.add_node(task) {
            warn!(project_id, task_id = %id, error = %err, "Skipping task");
            skipped += 1;
        }
    }
    for edge in edges {
        if let Err(err) = store.add_edge(&edge.from, &edge.to) {
            warn!(project_id, edge = %edge, error = %err, "Skipping dependency");
            skipped += 1;
        }
    }
    Ok((store, skipped))
}
