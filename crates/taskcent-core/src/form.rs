use std::fmt;

use taskcent_shared::{TaskDraft, TaskPatch, TaskPriority, TaskStatus};
use thiserror::Error;
use tracing::{debug, info};

use crate::datetime::{format_iso_date, parse_calendar_date};
use crate::error::ApiError;
use crate::store::TaskStore;
use crate::task::{Task, TaskId};

pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Description,
    DueDate,
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Title => "title",
            Self::Description => "description",
            Self::DueDate => "due date",
        })
    }
}

/// Client-side rejection of form input. Never reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub field: FormField,
    pub message: &'static str,
}

impl ValidationError {
    const fn new(field: FormField, message: &'static str) -> Self {
        Self { field, message }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Created(Task),
    Updated(Task),
}

impl Submission {
    pub fn task(&self) -> &Task {
        match self {
            Self::Created(task) | Self::Updated(task) => task,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Created(_) => "Task created successfully",
            Self::Updated(_) => "Task updated successfully",
        }
    }
}

/// Raw field values as typed by the user. Edit mode is whatever form has an
/// `existing` identifier; there is no separate flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskForm {
    pub existing: Option<TaskId>,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: String,
    pub category: String,
}

impl Default for TaskForm {
    fn default() -> Self {
        Self {
            existing: None,
            title: String::new(),
            description: String::new(),
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            due_date: String::new(),
            category: String::new(),
        }
    }
}

impl TaskForm {
    pub fn edit(task: &Task) -> Self {
        Self {
            existing: Some(task.id().clone()),
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            status: task.status,
            priority: task.priority,
            due_date: task.due_date.map(format_iso_date).unwrap_or_default(),
            category: task.category.clone().unwrap_or_default(),
        }
    }

    pub fn is_edit(&self) -> bool {
        self.existing.is_some()
    }

    pub fn validate(&self) -> Result<TaskDraft, ValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::new(FormField::Title, "Title is required"));
        }

        let due_raw = self.due_date.trim();
        if due_raw.is_empty() {
            return Err(ValidationError::new(
                FormField::DueDate,
                "Due date is required",
            ));
        }
        let due = parse_calendar_date(due_raw).ok_or(ValidationError::new(
            FormField::DueDate,
            "Due date must be a valid date (YYYY-MM-DD)",
        ))?;

        if title.chars().count() > TITLE_MAX_CHARS {
            return Err(ValidationError::new(
                FormField::Title,
                "Title must be less than 200 characters",
            ));
        }
        if self.description.chars().count() > DESCRIPTION_MAX_CHARS {
            return Err(ValidationError::new(
                FormField::Description,
                "Description must be less than 1000 characters",
            ));
        }

        Ok(TaskDraft {
            title: title.to_string(),
            description: non_empty(&self.description),
            status: self.status,
            priority: self.priority,
            due_date: Some(format_iso_date(due)),
            category: non_empty(self.category.trim()),
        })
    }

    /// Validates, then creates or updates through the store.
    #[tracing::instrument(skip(self, store), fields(edit = self.is_edit()))]
    pub async fn submit(&self, store: &TaskStore) -> Result<Submission, FormError> {
        let draft = self.validate().inspect_err(|err| {
            debug!(field = %err.field, message = err.message, "form rejected");
        })?;

        let submission = match &self.existing {
            Some(id) => Submission::Updated(store.update_task(id, TaskPatch::from(draft)).await?),
            None => Submission::Created(store.add_task(draft).await?),
        };
        info!(id = %submission.task().id(), "{}", submission.message());
        Ok(submission)
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
