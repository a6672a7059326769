use chrono::{NaiveDate, NaiveTime};
use std::collections::HashSet;
use thiserror::Error;

use super::task::TaskId;

/// Form field an error belongs to. `Form` marks errors that are not tied to
/// a single input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    DueDate,
    DueTime,
    Dependencies,
    From,
    To,
    Form,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::DueDate => "due_date",
            Field::DueTime => "due_time",
            Field::Dependencies => "dependencies",
            Field::From => "from",
            Field::To => "to",
            Field::Form => "form",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct FormError {
    pub field: Field,
    pub message: String,
}

impl FormError {
    pub fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }

    pub fn form(message: impl Into<String>) -> Self {
        Self::new(Field::Form, message)
    }
}

pub struct TaskValidator;

impl TaskValidator {
    pub fn validate_name(name: &str) -> Result<(), FormError> {
        if name.trim().is_empty() {
            return Err(FormError::new(Field::Name, "Task name cannot be empty"));
        }
        Ok(())
    }

    pub fn validate_due(date: Option<NaiveDate>, time: Option<NaiveTime>) -> Result<(), FormError> {
        if date.is_none() && time.is_some() {
            return Err(FormError::new(Field::DueTime, "Pick a due date before a time"));
        }
        Ok(())
    }

    /// A task cannot list itself, and each dependency appears once.
    pub fn validate_dependencies(task: Option<&TaskId>, dependencies: &[TaskId]) -> Result<(), FormError> {
        let mut seen = HashSet::new();
        for dependency in dependencies {
            if Some(dependency) == task {
                return Err(FormError::new(Field::Dependencies, "A task cannot depend on itself"));
            }
            if !seen.insert(dependency) {
                return Err(FormError::new(
                    Field::Dependencies,
                    format!("Dependency {dependency} is listed twice"),
                ));
            }
        }
        Ok(())
    }
}
