use serde::{
  Deserialize,
  Serialize
};

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
)]
pub enum TaskStatus {
  #[serde(rename = "pending", alias = "todo")]
  Pending,
  #[serde(rename = "in-progress")]
  InProgress,
  #[serde(rename = "completed")]
  Completed
}

impl TaskStatus {
  pub const fn as_str(
    self
  ) -> &'static str {
    match self {
      | Self::Pending => "pending",
      | Self::InProgress => "in-progress",
      | Self::Completed => "completed"
    }
  }

  /// Accepts the legacy `todo` spelling
  /// as `Pending`.
  pub fn parse(
    value: &str
  ) -> Option<Self> {
    match value {
      | "pending" | "todo" => {
        Some(Self::Pending)
      }
      | "in-progress" => {
        Some(Self::InProgress)
      }
      | "completed" => {
        Some(Self::Completed)
      }
      | _ => None
    }
  }

  pub const fn label(
    self
  ) -> &'static str {
    match self {
      | Self::Pending => "To Do",
      | Self::InProgress => "In Progress",
      | Self::Completed => "Completed"
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
  High,
  Medium,
  Low
}

impl TaskPriority {
  pub const fn as_str(
    self
  ) -> &'static str {
    match self {
      | Self::High => "high",
      | Self::Medium => "medium",
      | Self::Low => "low"
    }
  }

  pub fn parse(
    value: &str
  ) -> Option<Self> {
    match value {
      | "high" => Some(Self::High),
      | "medium" => Some(Self::Medium),
      | "low" => Some(Self::Low),
      | _ => None
    }
  }

  /// Sort rank, most urgent first.
  pub const fn rank(self) -> u8 {
    match self {
      | Self::High => 0,
      | Self::Medium => 1,
      | Self::Low => 2
    }
  }
}

/// Identifiers have shipped both as
/// strings and as numbers.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
#[serde(untagged)]
pub enum RawId {
  Text(String),
  Number(i64)
}

impl RawId {
  pub fn into_string(self) -> String {
    match self {
      | Self::Text(text) => text,
      | Self::Number(number) => {
        number.to_string()
      }
    }
  }
}

/// A task exactly as the server sent
/// it. Both historical spellings of the
/// identifier (`_id`, `id`) and of the
/// due date (`dueDate`, `due_date`) are
/// captured side by side.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct RawTask {
  #[serde(
    rename = "_id",
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub object_id:      Option<RawId>,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub id:             Option<RawId>,
  #[serde(default)]
  pub title:          String,
  #[serde(default)]
  pub description:    Option<String>,
  #[serde(default)]
  pub priority:       Option<String>,
  #[serde(default)]
  pub status:         Option<String>,
  #[serde(
    rename = "dueDate",
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub due_date:       Option<String>,
  #[serde(
    rename = "due_date",
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub legacy_due_date: Option<String>,
  #[serde(default)]
  pub category:       Option<String>
}

/// List endpoints answered with a bare
/// array in older releases and with an
/// envelope later.
#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
#[serde(untagged)]
pub enum TaskListResponse {
  Bare(Vec<RawTask>),
  Envelope { tasks: Vec<RawTask> }
}

impl TaskListResponse {
  pub fn into_tasks(
    self
  ) -> Vec<RawTask> {
    match self {
      | Self::Bare(tasks)
      | Self::Envelope { tasks } => tasks
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct TaskDraft {
  pub title:       String,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub description: Option<String>,
  pub status:      TaskStatus,
  pub priority:    TaskPriority,
  #[serde(
    rename = "dueDate",
    skip_serializing_if = "Option::is_none"
  )]
  pub due_date:    Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub category:    Option<String>
}

/// Partial update. `None` leaves a field
/// alone; `Some(None)` clears it.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
  Default,
)]
pub struct TaskPatch {
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub title:       Option<String>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub description:
    Option<Option<String>>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub status:      Option<TaskStatus>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub priority:    Option<TaskPriority>,
  #[serde(
    rename = "dueDate",
    skip_serializing_if = "Option::is_none"
  )]
  pub due_date:    Option<Option<String>>,
  #[serde(
    skip_serializing_if = "Option::is_none"
  )]
  pub category:    Option<Option<String>>
}

impl TaskPatch {
  pub fn is_empty(&self) -> bool {
    self == &Self::default()
  }
}

impl From<TaskDraft> for TaskPatch {
  fn from(draft: TaskDraft) -> Self {
    Self {
      title:       Some(draft.title),
      description: Some(
        draft.description
      ),
      status:      Some(draft.status),
      priority:    Some(draft.priority),
      due_date:    Some(draft.due_date),
      category:    Some(draft.category)
    }
  }
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct Credentials {
  pub email:    String,
  pub password: String
}

#[derive(
  Debug, Clone, Serialize, Deserialize,
)]
pub struct AuthResponse {
  #[serde(alias = "access_token")]
  pub token: String,
  #[serde(default)]
  pub email: Option<String>
}

/// Error envelope. Servers have used
/// both `detail` and `message`; `code`
/// is the structured discriminator.
#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  Default,
)]
pub struct ErrorBody {
  #[serde(default)]
  pub detail:  Option<String>,
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default)]
  pub code:    Option<String>
}

impl ErrorBody {
  pub fn text(&self) -> Option<&str> {
    self
      .detail
      .as_deref()
      .or(self.message.as_deref())
      .map(str::trim)
      .filter(|text| !text.is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::{
    RawId,
    RawTask,
    TaskDraft,
    TaskListResponse,
    TaskPatch,
    TaskPriority,
    TaskStatus
  };

  #[test]
  fn raw_task_keeps_both_key_spellings()
  {
    let raw: RawTask =
      serde_json::from_str(
        r#"{"_id":"a1","id":7,"title":"x","dueDate":"2024-01-01","due_date":"2023-12-31"}"#
      )
      .expect("decode raw task");
    assert_eq!(
      raw.object_id,
      Some(RawId::Text("a1".to_string()))
    );
    assert_eq!(
      raw.id,
      Some(RawId::Number(7))
    );
    assert_eq!(
      raw.due_date.as_deref(),
      Some("2024-01-01")
    );
    assert_eq!(
      raw.legacy_due_date.as_deref(),
      Some("2023-12-31")
    );
  }

  #[test]
  fn status_accepts_legacy_todo() {
    let status: TaskStatus =
      serde_json::from_str("\"todo\"")
        .expect("decode todo");
    assert_eq!(
      status,
      TaskStatus::Pending
    );
    assert_eq!(
      serde_json::to_string(
        &TaskStatus::InProgress
      )
      .expect("encode"),
      "\"in-progress\""
    );
    assert_eq!(
      TaskStatus::parse("done"),
      None
    );
  }

  #[test]
  fn draft_omits_absent_due_date() {
    let draft = TaskDraft {
      title:       "Buy milk".to_string(),
      description: None,
      status:      TaskStatus::Pending,
      priority:    TaskPriority::Low,
      due_date:    None,
      category:    None
    };
    let json = serde_json::to_value(
      &draft
    )
    .expect("encode draft");
    assert!(json.get("dueDate").is_none());
    assert_eq!(json["priority"], "low");
  }

  #[test]
  fn patch_distinguishes_clear_from_keep()
  {
    let patch = TaskPatch {
      due_date: Some(None),
      ..TaskPatch::default()
    };
    let json = serde_json::to_value(
      &patch
    )
    .expect("encode patch");
    assert!(json["dueDate"].is_null());
    assert!(json.get("title").is_none());
    assert!(!patch.is_empty());
    assert!(
      TaskPatch::default().is_empty()
    );
  }

  #[test]
  fn list_response_accepts_bare_and_envelope()
   {
    let bare: TaskListResponse =
      serde_json::from_str(
        r#"[{"_id":"a"}]"#
      )
      .expect("bare");
    let envelope: TaskListResponse =
      serde_json::from_str(
        r#"{"tasks":[{"id":"b"},{"id":"c"}]}"#
      )
      .expect("envelope");
    assert_eq!(
      bare.into_tasks().len(),
      1
    );
    assert_eq!(
      envelope.into_tasks().len(),
      2
    );
  }
}
