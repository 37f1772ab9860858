//! Structured error types for workflow operations.

use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (4xx-like)
    MissingRequiredField,
    InvalidFieldValue,

    // Not found errors
    TaskNotFound,
    ClientNotFound,
    RuleNotFound,
    TemplateNotFound,
    LinkNotFound,

    // Conflict errors
    LinksIncomplete,
    AlreadyExists,

    // Internal errors
    DatabaseError,
    InternalError,
}

/// Structured error for workflow operations.
#[derive(Debug, Serialize)]
pub struct EngineError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl EngineError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            details: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("{} is required", field),
        )
        .with_field(field)
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn task_not_found(task_id: i64) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
    }

    pub fn client_not_found(client_id: i64) -> Self {
        Self::new(
            ErrorCode::ClientNotFound,
            format!("Client not found: {}", client_id),
        )
    }

    pub fn rule_not_found(rule_id: i64) -> Self {
        Self::new(
            ErrorCode::RuleNotFound,
            format!("Recurring rule not found: {}", rule_id),
        )
    }

    pub fn template_not_found(template_id: i64) -> Self {
        Self::new(
            ErrorCode::TemplateNotFound,
            format!("Onboarding template not found: {}", template_id),
        )
    }

    pub fn link_not_found(task_id: i64, client_id: i64) -> Self {
        Self::new(
            ErrorCode::LinkNotFound,
            format!("Task {} has no link for client {}", task_id, client_id),
        )
    }

    pub fn links_incomplete(task_id: i64, open: i64) -> Self {
        Self::new(
            ErrorCode::LinksIncomplete,
            "all linked clients must be checked off first",
        )
        .with_details(format!("task {} has {} unchecked link(s)", task_id, open))
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EngineError {}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        // Try to downcast to EngineError first
        match err.downcast::<EngineError>() {
            Ok(engine_err) => engine_err,
            Err(err) => EngineError::internal(err),
        }
    }
}

/// Result type for workflow operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
