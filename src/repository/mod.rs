pub mod database;
pub mod dependency_repository;
pub mod http_backend;
pub mod task_repository;

use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;

use crate::config::BackendConfig;
use crate::domain::dependency::DependencyEdge;
use crate::domain::task::{TaskId, TaskNode};

pub use http_backend::HttpBackend;

/// Failure of a backend round trip.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("not authorized")]
    Unauthorized,

    #[error("server responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("network error: {0}")]
    Transport(String),

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

/// Persistence for one project's tasks and dependency edges. The editor
/// validates every change before it gets here.
#[automock]
#[async_trait]
pub trait TaskBackend: Send + Sync {
    async fn list_tasks(&self, project_id: &str) -> Result<Vec<TaskNode>, ApiError>;

    async fn list_dependencies(&self, project_id: &str) -> Result<Vec<DependencyEdge>, ApiError>;

    async fn create_task(&self, project_id: &str, task: &TaskNode) -> Result<(), ApiError>;

    async fn update_task(&self, project_id: &str, task: &TaskNode) -> Result<(), ApiError>;

    /// Also removes every dependency touching the task.
    async fn delete_task(&self, project_id: &str, id: &TaskId) -> Result<(), ApiError>;

    async fn create_dependency(&self, project_id: &str, edge: &DependencyEdge) -> Result<(), ApiError>;

    async fn delete_dependency(&self, project_id: &str, edge: &DependencyEdge) -> Result<(), ApiError>;
}

/// Local SQLite storage.
#[derive(Clone)]
pub struct Repository {
    pub pool: Arc<SqlitePool>,
    pub tasks: task_repository::TaskRepository,
    pub dependencies: dependency_repository::DependencyRepository,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        let pool = Arc::new(pool);
        Self {
            tasks: task_repository::TaskRepository::new(pool.clone()),
            dependencies: dependency_repository::DependencyRepository::new(pool.clone()),
            pool,
        }
    }

    pub async fn open(db_path: &str) -> Result<Self> {
        Ok(Self::new(database::init_database(db_path).await?))
    }

    pub async fn new_memory() -> Result<Self> {
        Ok(Self::new(database::init_test_database().await?))
    }
}

#[async_trait]
impl TaskBackend for Repository {
    async fn list_tasks(&self, project_id: &str) -> Result<Vec<TaskNode>, ApiError> {
        self.tasks.list(project_id).await
    }

    async fn list_dependencies(&self, project_id: &str) -> Result<Vec<DependencyEdge>, ApiError> {
        self.dependencies.list(project_id).await
    }

    async fn create_task(&self, project_id: &str, task: &TaskNode) -> Result<(), ApiError> {
        self.tasks.create(project_id, task).await
    }

    async fn update_task(&self, project_id: &str, task: &TaskNode) -> Result<(), ApiError> {
        self.tasks.update(project_id, task).await
    }

    async fn delete_task(&self, project_id: &str, id: &TaskId) -> Result<(), ApiError> {
        self.tasks.delete(project_id, id).await
    }

    async fn create_dependency(&self, project_id: &str, edge: &DependencyEdge) -> Result<(), ApiError> {
        self.dependencies.create(project_id, edge).await
    }

    async fn delete_dependency(&self, project_id: &str, edge: &DependencyEdge) -> Result<(), ApiError> {
        self.dependencies.delete(project_id, edge).await
    }
}

/// Builds the backend selected in the configuration.
pub async fn connect(config: &BackendConfig) -> Result<Arc<dyn TaskBackend>> {
    let backend: Arc<dyn TaskBackend> = match config {
        BackendConfig::Sqlite { path } => Arc::new(Repository::open(path).await?),
        BackendConfig::Http { base_url, token } => Arc::new(HttpBackend::new(base_url, token.clone())?),
    };
    Ok(backend)
}
