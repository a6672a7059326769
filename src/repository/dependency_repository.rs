use chrono::Utc;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

use crate::domain::dependency::DependencyEdge;
use crate::domain::task::TaskId;
use crate::repository::ApiError;

#[derive(Clone)]
pub struct DependencyRepository {
    pool: Arc<SqlitePool>,
}

impl DependencyRepository {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    pub async fn create(&self, project_id: &str, edge: &DependencyEdge) -> Result<(), ApiError> {
        sqlx::query(
            r#"
            INSERT INTO dependencies (project_id, from_task_id, to_task_id, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(project_id)
        .bind(edge.from.as_str())
        .bind(edge.to.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    /// Deleting a pair that is not stored is not an error.
    pub async fn delete(&self, project_id: &str, edge: &DependencyEdge) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM dependencies WHERE project_id = ? AND from_task_id = ? AND to_task_id = ?")
            .bind(project_id)
            .bind(edge.from.as_str())
            .bind(edge.to.as_str())
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    pub async fn list(&self, project_id: &str) -> Result<Vec<DependencyEdge>, ApiError> {
        let rows = sqlx::query("SELECT from_task_id, to_task_id FROM dependencies WHERE project_id = ? ORDER BY rowid")
            .bind(project_id)
            .fetch_all(self.pool.as_ref())
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(DependencyEdge {
                    from: TaskId::new(row.try_get::<String, _>("from_task_id")?),
                    to: TaskId::new(row.try_get::<String, _>("to_task_id")?),
                })
            })
            .collect()
    }
}
