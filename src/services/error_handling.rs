use anyhow::{Context, Result};
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

use crate::domain::graph::GraphError;
use crate::domain::task_validation::FormError;
use crate::repository::ApiError;
use crate::services::notifications::NotificationKind;

/// Everything that can go wrong while editing a project graph. None of these
/// escape the editor: they are logged and turned into notifications.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    #[error(transparent)]
    Form(#[from] FormError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl EditorError {
    pub fn is_validation(&self) -> bool {
        match self {
            EditorError::Form(_) => true,
            EditorError::Graph(err) => err.is_validation(),
            EditorError::Api(_) => false,
        }
    }

    /// A 401 from the backend; the host should send the user to log in.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, EditorError::Api(ApiError::Unauthorized))
    }

    pub fn notification_kind(&self) -> NotificationKind {
        match self {
            EditorError::Form(_) => NotificationKind::Warning,
            _ => NotificationKind::Error,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            EditorError::Form(_) => "Check the form",
            EditorError::Graph(GraphError::Cycle { .. }) => "Circular dependency",
            EditorError::Graph(GraphError::DuplicateEdge { .. }) => "Duplicate dependency",
            EditorError::Graph(GraphError::SelfLoop { .. }) => "Invalid dependency",
            EditorError::Graph(GraphError::DuplicateId { .. }) => "Duplicate task",
            EditorError::Graph(GraphError::NotFound { .. }) => "Task not found",
            EditorError::Api(ApiError::Unauthorized) => "Session expired",
            EditorError::Api(_) => "Could not reach the server",
        }
    }

    /// User-facing text for the notification body.
    pub fn user_message(&self) -> String {
        match self {
            EditorError::Graph(GraphError::Cycle { .. }) => {
                "Cannot create this dependency as it would create a circular reference.".to_string()
            }
            EditorError::Graph(GraphError::NotFound { .. }) => {
                "The requested task could not be found. Reload the project and try again.".to_string()
            }
            EditorError::Api(ApiError::Unauthorized) => "Please log in again.".to_string(),
            EditorError::Api(ApiError::Transport(_)) => {
                "Network connection error. Please check your connection and try again.".to_string()
            }
            EditorError::Api(ApiError::Status { status, .. }) if *status >= 500 => {
                "The server failed to save your change. Please try again.".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn log(&self, operation: &str) {
        match self {
            err if err.is_validation() => warn!(
                operation = %operation,
                error = %err,
                "Validation failed"
            ),
            EditorError::Graph(err) => error!(
                operation = %operation,
                error = %err,
                "Operation referenced a missing task"
            ),
            err => error!(
                operation = %operation,
                error = %err,
                "Backend request failed"
            ),
        }
    }
}

/// Names the step that failed while opening a workspace, with the inputs
/// that identify it.
pub struct ErrorContext {
    operation: &'static str,
    details: Vec<(&'static str, String)>,
}

impl ErrorContext {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            details: Vec::new(),
        }
    }

    pub fn with_detail(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.details.push((key, value.to_string()));
        self
    }

    pub fn wrap<T, E>(self, result: std::result::Result<T, E>) -> Result<T>
    where
        E: Into<anyhow::Error>,
    {
        result.map_err(Into::into).with_context(|| {
            let details: Vec<String> = self.details.iter().map(|(k, v)| format!("{k}={v}")).collect();
            if details.is_empty() {
                format!("Could not {}", self.operation)
            } else {
                format!("Could not {} ({})", self.operation, details.join(", "))
            }
        })
    }
}
