use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a task, unique within one project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Task status. The backend may send statuses this build does not know
/// about; those are kept verbatim in `Other`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Done,
    Other(String),
}

impl TaskStatus {
    pub const KNOWN: [TaskStatus; 3] = [TaskStatus::Pending, TaskStatus::InProgress, TaskStatus::Done];

    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Other(s) => s,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            TaskStatus::Pending => "Pending",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
            TaskStatus::Other(s) => s,
        }
    }
}

impl From<String> for TaskStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pending" => TaskStatus::Pending,
            "in_progress" => TaskStatus::InProgress,
            "done" => TaskStatus::Done,
            _ => TaskStatus::Other(value),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a user assigned to a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl UserRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskNode {
    pub id: TaskId,
    pub name: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assignees: Vec<UserRef>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
}

impl TaskNode {
    pub fn new(id: impl Into<TaskId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: TaskStatus::Pending,
            due_date: None,
            assignees: Vec::new(),
            created_at: Utc::now(),
            description: String::new(),
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn assign(mut self, user: UserRef) -> Self {
        if !self.assignees.contains(&user) {
            self.assignees.push(user);
        }
        self
    }

    pub fn is_done(&self) -> bool {
        self.status == TaskStatus::Done
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.is_done() && self.due_date.is_some_and(|due| due < now)
    }

    pub fn apply(&mut self, patch: TaskPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(assignees) = patch.assignees {
            self.assignees = assignees;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
    }
}

/// Partial update of a task's mutable attributes. `None` leaves a field
/// untouched; `due_date: Some(None)` clears the due date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    pub name: Option<String>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub assignees: Option<Vec<UserRef>>,
    pub description: Option<String>,
}

impl TaskPatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.status.is_none()
            && self.due_date.is_none()
            && self.assignees.is_none()
            && self.description.is_none()
    }

    /// Patch that turns `current` into `target`, touching only changed fields.
    pub fn diff(current: &TaskNode, target: &TaskNode) -> Self {
        Self {
            name: (current.name != target.name).then(|| target.name.clone()),
            status: (current.status != target.status).then(|| target.status.clone()),
            due_date: (current.due_date != target.due_date).then_some(target.due_date),
            assignees: (current.assignees != target.assignees).then(|| target.assignees.clone()),
            description: (current.description != target.description)
                .then(|| target.description.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_status_round_trips_through_strings() {
        assert_eq!(TaskStatus::from("in_progress".to_string()), TaskStatus::InProgress);
        assert_eq!(String::from(TaskStatus::Done), "done");

        let custom = TaskStatus::from("blocked".to_string());
        assert_eq!(custom, TaskStatus::Other("blocked".to_string()));
        assert_eq!(custom.as_str(), "blocked");
    }

    #[test]
    fn test_task_node_deserializes_backend_record() {
        let json = r#"{
            "id": "42",
            "name": "Write docs",
            "status": "review",
            "assignees": [{"id": "u1", "name": "Sam"}],
            "created_at": "2024-03-01T10:00:00Z"
        }"#;
        let node: TaskNode = serde_json::from_str(json).unwrap();

        assert_eq!(node.id, TaskId::from("42"));
        assert_eq!(node.status, TaskStatus::Other("review".to_string()));
        assert_eq!(node.assignees.len(), 1);
        assert!(node.due_date.is_none());
        assert_eq!(node.description, "");
    }

    #[test]
    fn test_apply_patch() {
        let mut node = TaskNode::new("1", "Draft")
            .with_due_date(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());

        node.apply(TaskPatch {
            name: Some("Final".to_string()),
            due_date: Some(None),
            ..Default::default()
        });

        assert_eq!(node.name, "Final");
        assert!(node.due_date.is_none());
        assert_eq!(node.status, TaskStatus::Pending);
    }

    #[test]
    fn test_patch_diff_only_contains_changes() {
        let current = TaskNode::new("1", "Same").with_description("old");
        let mut target = current.clone();
        target.description = "new".to_string();

        let patch = TaskPatch::diff(&current, &target);
        assert!(patch.name.is_none());
        assert_eq!(patch.description.as_deref(), Some("new"));
        assert!(TaskPatch::diff(&current, &current).is_empty());
    }

    #[test]
    fn test_overdue() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let past = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let task = TaskNode::new("1", "Late").with_due_date(past);
        assert!(task.is_overdue(now));
        assert!(!task.with_status(TaskStatus::Done).is_overdue(now));
    }
}
