use std::fmt;

use thiserror::Error;

/// Failure categories a caller can branch on. Client-side form validation
/// never produces one of these; see `form::ValidationError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The server rejected the request body.
    Validation,
    NotFound,
    Permission,
    /// The server detected a concurrent edit.
    Conflict,
    /// Network failure, timeout or an unexpected status.
    Transport,
    /// The server answered with data that violates the task model.
    InvalidPayload,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Permission => "permission",
            Self::Conflict => "conflict",
            Self::Transport => "transport",
            Self::InvalidPayload => "invalid_payload",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every API-backed operation. `Display` is the
/// human-readable detail meant for the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{detail}")]
pub struct ApiError {
    kind: ErrorKind,
    code: Option<String>,
    detail: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            detail: detail.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn validation(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, detail)
    }

    pub fn permission(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Permission, detail)
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, detail)
    }

    pub fn transport(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, detail)
    }

    pub fn invalid_payload(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidPayload, detail)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Machine-readable code sent by the server, if any.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

/// A payload that cannot be represented as a canonical task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("task payload has no identifier")]
    MissingIdentifier,

    #[error("unknown task status {0:?}")]
    UnknownStatus(String),

    #[error("unknown task priority {0:?}")]
    UnknownPriority(String),

    #[error("invalid due date {0:?}")]
    InvalidDueDate(String),
}

impl From<ModelError> for ApiError {
    fn from(err: ModelError) -> Self {
        ApiError::invalid_payload(format!("malformed task from server: {err}"))
    }
}
