use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::dependency::DependencyEdge;
use crate::domain::task::{TaskId, TaskNode};
use crate::repository::{ApiError, TaskBackend};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// REST client for a remote project service.
///
/// Every request carries the bearer token when one is configured. A 401
/// surfaces as [`ApiError::Unauthorized`] so the host can ask the user to
/// log in again.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: &str, token: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
            token,
        })
    }

    /// Appends percent-encoded path segments to the base URL.
    pub fn url(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Transport(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, ApiError> {
        let url = self.url(segments)?;
        debug!(%method, %url, "Backend request");
        let builder = self.client.request(method, url);
        Ok(match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn send(builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await.map_err(transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "Backend rejected request");
        Err(status_error(status, body))
    }

    async fn json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ApiError> {
        let response = Self::send(builder).await?;
        response.json().await.map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Maps a non-success status to an error.
pub fn status_error(status: StatusCode, body: String) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        other => ApiError::Status {
            status: other.as_u16(),
            body,
        },
    }
}

fn transport(err: reqwest::Error) -> ApiError {
    ApiError::Transport(err.to_string())
}

#[async_trait]
impl TaskBackend for HttpBackend {
    async fn list_tasks(&self, project_id: &str) -> Result<Vec<TaskNode>, ApiError> {
        Self::json(self.request(Method::GET, &["projects", project_id, "tasks"])?).await
    }

    async fn list_dependencies(&self, project_id: &str) -> Result<Vec<DependencyEdge>, ApiError> {
        Self::json(self.request(Method::GET, &["projects", project_id, "dependencies"])?).await
    }

    async fn create_task(&self, project_id: &str, task: &TaskNode) -> Result<(), ApiError> {
        let builder = self.request(Method::POST, &["projects", project_id, "tasks"])?;
        Self::send(builder.json(task)).await.map(drop)
    }

    async fn update_task(&self, project_id: &str, task: &TaskNode) -> Result<(), ApiError> {
        let builder = self.request(Method::PUT, &["projects", project_id, "tasks", task.id.as_str()])?;
        Self::send(builder.json(task)).await.map(drop)
    }

    async fn delete_task(&self, project_id: &str, id: &TaskId) -> Result<(), ApiError> {
        let builder = self.request(Method::DELETE, &["projects", project_id, "tasks", id.as_str()])?;
        Self::send(builder).await.map(drop)
    }

    async fn create_dependency(&self, project_id: &str, edge: &DependencyEdge) -> Result<(), ApiError> {
        let builder = self.request(Method::POST, &["projects", project_id, "dependencies"])?;
        Self::send(builder.json(edge)).await.map(drop)
    }

    async fn delete_dependency(&self, project_id: &str, edge: &DependencyEdge) -> Result<(), ApiError> {
        let builder = self.request(
            Method::DELETE,
            &["projects", project_id, "dependencies", edge.from.as_str(), edge.to.as_str()],
        )?;
        Self::send(builder).await.map(drop)
    }
}
