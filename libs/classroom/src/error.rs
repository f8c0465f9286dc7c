//! Error taxonomy for the transactional core
//!
//! Every operation returns a [`CoreError`] whose [`ErrorKind`] callers can
//! branch on. Capacity and clash violations always surface as
//! `ResourceExhausted` and `FailedPrecondition`.

use serde::Serialize;
use thiserror::Error;

/// Stable classification of a [`CoreError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Unauthenticated,
    PermissionDenied,
    InvalidArgument,
    NotFound,
    FailedPrecondition,
    ResourceExhausted,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::NotFound => "not_found",
            ErrorKind::FailedPrecondition => "failed_precondition",
            ErrorKind::ResourceExhausted => "resource_exhausted",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Error type for core operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// No actor identity was supplied
    #[error("Login required")]
    Unauthenticated,

    /// Actor lacks the role, ownership or approval the operation needs
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Malformed or missing field
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Referenced entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request is valid but the current state forbids it
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Capacity limit reached
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Unexpected failure from a collaborator
    #[error("Internal error: {0}")]
    Internal(String),

    /// Store failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Unauthenticated => ErrorKind::Unauthenticated,
            CoreError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            CoreError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::FailedPrecondition(_) => ErrorKind::FailedPrecondition,
            CoreError::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            CoreError::Internal(_) | CoreError::Database(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn not_found(what: &str) -> Self {
        CoreError::NotFound(format!("{} not found", what))
    }

    pub(crate) fn denied(reason: &str) -> Self {
        CoreError::PermissionDenied(reason.to_string())
    }
}

/// Type alias for Result with CoreError
pub type CoreResult<T> = Result<T, CoreError>;
