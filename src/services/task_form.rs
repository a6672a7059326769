use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use tracing::debug;

use crate::domain::graph::GraphStore;
use crate::domain::task::{TaskId, TaskNode, TaskPatch, TaskStatus, UserRef};
use crate::domain::task_validation::{Field, FormError, TaskValidator};
use crate::services::error_handling::EditorError;

/// Local form state for creating or editing a task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDraft {
    /// `None` creates a task with a fresh id.
    pub id: Option<TaskId>,
    pub name: String,
    pub status: TaskStatus,
    pub assignees: Vec<UserRef>,
    pub due_date: Option<NaiveDate>,
    /// Defaults to the end of the day when only a date is picked.
    pub due_time: Option<NaiveTime>,
    pub description: String,
    /// Tasks that must finish before this one.
    pub dependencies: Vec<TaskId>,
}

impl TaskDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<TaskId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn depends_on(mut self, id: impl Into<TaskId>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    /// Prefills the form from a stored task, showing the due date in `tz`.
    pub fn from_node<Tz: TimeZone>(store: &GraphStore, id: &TaskId, tz: &Tz) -> Option<Self> {
        let node = store.node(id)?;
        let local_due = node.due_date.map(|due| due.with_timezone(tz).naive_local());
        Some(Self {
            id: Some(node.id.clone()),
            name: node.name.clone(),
            status: node.status.clone(),
            assignees: node.assignees.clone(),
            due_date: local_due.map(|due| due.date()),
            due_time: local_due.map(|due| due.time()),
            description: node.description.clone(),
            dependencies: store.dependencies_of(id),
        })
    }

    /// The due date as an absolute instant. Local times that fall into a
    /// DST gap move forward by an hour; ambiguous ones take the earlier
    /// instant.
    pub fn due_at<Tz: TimeZone>(&self, tz: &Tz) -> Result<Option<DateTime<Utc>>, FormError> {
        TaskValidator::validate_due(self.due_date, self.due_time)?;
        let Some(date) = self.due_date else {
            return Ok(None);
        };
        let time = self.due_time.unwrap_or_else(end_of_day);
        let local = NaiveDateTime::new(date, time);

        tz.from_local_datetime(&local)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
            .map(|due| Some(due.with_timezone(&Utc)))
            .ok_or_else(|| FormError::new(Field::DueTime, "That time does not exist in your time zone"))
    }

    fn to_node(&self, id: TaskId, due_date: Option<DateTime<Utc>>, created_at: DateTime<Utc>) -> TaskNode {
        TaskNode {
            id,
            name: self.name.trim().to_string(),
            status: self.status.clone(),
            due_date,
            assignees: self.assignees.clone(),
            created_at,
            description: self.description.clone(),
        }
    }
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default()
}

pub struct TaskForm;

impl TaskForm {
    /// Validates the draft and writes it to the store together with its
    /// dependency set. Either everything is applied or nothing is.
    ///
    /// A draft whose id is already in the store updates that task; any other
    /// draft creates one (with its own id if it carries one).
    pub fn save<Tz: TimeZone>(store: &mut GraphStore, draft: &TaskDraft, tz: &Tz) -> Result<TaskId, EditorError> {
        TaskValidator::validate_name(&draft.name)?;
        TaskValidator::validate_dependencies(draft.id.as_ref(), &draft.dependencies)?;
        let due_date = draft.due_at(tz)?;

        let mut candidate = store.clone();
        let existing = draft.id.as_ref().and_then(|id| candidate.node(id).cloned());
        let id = match existing {
            Some(current) => {
                let target = draft.to_node(current.id.clone(), due_date, current.created_at);
                let patch = TaskPatch::diff(&current, &target);
                if !patch.is_empty() {
                    candidate.update_node(&current.id, patch)?;
                }
                current.id
            }
            None => {
                let id = draft.id.clone().unwrap_or_else(TaskId::generate);
                candidate.add_node(draft.to_node(id.clone(), due_date, Utc::now()))?;
                id
            }
        };

        Self::sync_dependencies(&mut candidate, &id, &draft.dependencies)?;
        *store = candidate;
        debug!(task_id = %id, "Task saved");
        Ok(id)
    }

    /// Makes the incoming edges of `id` equal to `dependencies`.
    fn sync_dependencies(store: &mut GraphStore, id: &TaskId, dependencies: &[TaskId]) -> Result<(), EditorError> {
        for current in store.dependencies_of(id) {
            if !dependencies.contains(&current) {
                store.remove_edge(&current, id);
            }
        }
        for dependency in dependencies {
            if !store.contains_edge(dependency, id) {
                store.add_edge(dependency, id)?;
            }
        }
        Ok(())
    }
}
