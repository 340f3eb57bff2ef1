use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use taskcent_shared::{RawId, RawTask, TaskPriority, TaskStatus};
use tracing::trace;

use crate::datetime::parse_calendar_date;
use crate::error::ModelError;

/// Canonical task identifier. Whatever key the server used, it ends up here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TaskId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ModelError::MissingIdentifier);
        }
        Ok(Self(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    pub priority: TaskPriority,

    pub status: TaskStatus,

    #[serde(default)]
    pub due_date: Option<NaiveDate>,

    #[serde(default)]
    pub category: Option<String>,
}

impl Task {
    /// Absorbs every historical spelling of the task schema.
    ///
    /// `_id` wins over `id` and `dueDate` wins over `due_date`; an empty
    /// string counts as absent so the other spelling is consulted.
    pub fn normalize(raw: RawTask) -> Result<Self, ModelError> {
        let id = pick_id(raw.object_id)
            .or_else(|| pick_id(raw.id))
            .ok_or(ModelError::MissingIdentifier)?;

        let due_raw = pick_text(raw.due_date).or_else(|| pick_text(raw.legacy_due_date));
        let due_date = match due_raw {
            Some(value) => Some(
                parse_calendar_date(&value).ok_or(ModelError::InvalidDueDate(value))?,
            ),
            None => None,
        };

        let status = match pick_text(raw.status) {
            Some(value) => TaskStatus::parse(&value).ok_or(ModelError::UnknownStatus(value))?,
            None => TaskStatus::Pending,
        };

        let priority = match pick_text(raw.priority) {
            Some(value) => {
                TaskPriority::parse(&value).ok_or(ModelError::UnknownPriority(value))?
            }
            None => TaskPriority::Medium,
        };

        trace!(id = %id, ?status, ?priority, "normalized task payload");

        Ok(Self {
            id,
            title: raw.title,
            description: raw.description,
            priority,
            status,
            due_date,
            category: raw.category,
        })
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status != TaskStatus::Completed && self.due_date.is_some_and(|due| due < today)
    }
}

fn pick_id(raw: Option<RawId>) -> Option<TaskId> {
    raw.map(RawId::into_string)
        .and_then(|value| value.parse::<TaskId>().ok())
}

fn pick_text(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
