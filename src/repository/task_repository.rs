use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use tracing::debug;

use crate::domain::task::{TaskId, TaskNode, TaskStatus, UserRef};
use crate::repository::ApiError;

#[derive(Clone)]
pub struct TaskRepository {
    pool: Arc<SqlitePool>,
}

impl TaskRepository {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    pub async fn create(&self, project_id: &str, task: &TaskNode) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            INSERT INTO tasks (id, project_id, name, status, due_date, assignees, description, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(task.id.as_str())
        .bind(project_id)
        .bind(&task.name)
        .bind(task.status.as_str())
        .bind(task.due_date.map(|d| d.to_rfc3339()))
        .bind(serde_json::to_string(&task.assignees)?)
        .bind(&task.description)
        .bind(task.created_at.to_rfc3339())
        .execute(self.pool.as_ref())
        .await?;

        debug!(project_id, task_id = %task.id, "Task row inserted");
        Ok(())
    }

    pub async fn update(&self, project_id: &str, task: &TaskNode) -> Result<(), ApiError> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET name = ?, status = ?, due_date = ?, assignees = ?, description = ?
            WHERE id = ? AND project_id = ?
            "#,
        )
        .bind(&task.name)
        .bind(task.status.as_str())
        .bind(task.due_date.map(|d| d.to_rfc3339()))
        .bind(serde_json::to_string(&task.assignees)?)
        .bind(&task.description)
        .bind(task.id.as_str())
        .bind(project_id)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(&task.id));
        }
        Ok(())
    }

    pub async fn get(&self, project_id: &str, id: &TaskId) -> Result<Option<TaskNode>, ApiError> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ? AND project_id = ?")
            .bind(id.as_str())
            .bind(project_id)
            .fetch_optional(self.pool.as_ref())
            .await?;

        row.map(row_to_task).transpose()
    }

    /// Removes the task and its dependency rows in one transaction.
    pub async fn delete(&self, project_id: &str, id: &TaskId) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM dependencies WHERE project_id = ? AND (from_task_id = ? OR to_task_id = ?)")
            .bind(project_id)
            .bind(id.as_str())
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM tasks WHERE id = ? AND project_id = ?")
            .bind(id.as_str())
            .bind(project_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        tx.commit().await?;
        Ok(())
    }

    /// All tasks of a project in insertion order.
    pub async fn list(&self, project_id: &str) -> Result<Vec<TaskNode>, ApiError> {
        let rows = sqlx::query("SELECT * FROM tasks WHERE project_id = ? ORDER BY rowid")
            .bind(project_id)
            .fetch_all(self.pool.as_ref())
            .await?;

        rows.into_iter().map(row_to_task).collect()
    }
}

fn not_found(id: &TaskId) -> ApiError {
    ApiError::Status {
        status: 404,
        body: format!("task {} not found", id),
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ApiError::Decode(format!("invalid timestamp {value:?}: {e}")))
}

fn row_to_task(row: sqlx::sqlite::SqliteRow) -> Result<TaskNode, ApiError> {
    let assignees: Vec<UserRef> = serde_json::from_str(row.try_get("assignees")?)?;
    let due_date = row
        .try_get::<Option<String>, _>("due_date")?
        .map(|s| parse_timestamp(&s))
        .transpose()?;

    Ok(TaskNode {
        id: TaskId::new(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        status: TaskStatus::from(row.try_get::<String, _>("status")?),
        due_date,
        assignees,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
        description: row.try_get("description")?,
    })
}
