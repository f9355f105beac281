//! Error types for field-selection planning and projection.
//!
//! Errors fall into two buckets: client faults (a malformed or unresolvable
//! field spec, caught before any query executes) and server faults (a
//! mismatch between the plan and what the execution engine actually
//! loaded). Every client-facing variant names the slash-separated path to
//! the offending entry in the nested spec.

use thiserror::Error;

/// Errors raised while normalizing a field spec or building a query plan.
///
/// All of these are client-input errors and surface before any backend
/// execution is attempted.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid field spec at {path}: {reason}")]
    InvalidFieldSpec { path: String, reason: String },

    #[error("unknown field \"{name}\" at {path} on resource \"{resource}\"")]
    UnknownField {
        path: String,
        resource: String,
        name: String,
    },

    #[error("unknown argument \"{name}\" at {path}")]
    UnknownArgument { path: String, name: String },

    #[error("invalid argument \"{name}\" at {path}: {reason}")]
    InvalidArgument {
        path: String,
        name: String,
        reason: String,
    },

    #[error("field spec nesting at {path} exceeds maximum depth {max_depth}")]
    DepthExceeded { path: String, max_depth: usize },
}

impl PlanError {
    /// The path into the nested field spec where the error occurred.
    pub fn path(&self) -> &str {
        match self {
            PlanError::InvalidFieldSpec { path, .. }
            | PlanError::UnknownField { path, .. }
            | PlanError::UnknownArgument { path, .. }
            | PlanError::InvalidArgument { path, .. }
            | PlanError::DepthExceeded { path, .. } => path,
        }
    }
}

/// Errors raised while projecting an executed result.
#[derive(Debug, Error)]
pub enum ProjectError {
    /// A calculation the plan asked for came back unloaded. This is a
    /// plan/execution mismatch on the server side, not a client error;
    /// the message deliberately carries no internal shape beyond the path.
    #[error("field at {path} was not loaded")]
    NotLoaded { path: String },
}

/// Opaque failure from the external query execution engine.
///
/// The displayed message is what callers may surface to clients; any
/// internal detail travels separately and is only ever logged.
#[derive(Debug, Error)]
#[error("query execution failed: {message}")]
pub struct ExecutionError {
    message: String,
    detail: Option<String>,
}

impl ExecutionError {
    /// Create an error with a client-safe message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    /// Attach internal detail. Never included in `Display`.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// The client-safe message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Internal detail for server-side logs, if any.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

/// Any failure across the plan → execute → project pipeline.
#[derive(Debug, Error)]
pub enum SelectError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Project(#[from] ProjectError),
}

impl SelectError {
    /// True when the failure was caused by client input rather than a
    /// server-side invariant violation or execution failure.
    pub fn is_client_fault(&self) -> bool {
        matches!(self, SelectError::Plan(_))
    }
}
