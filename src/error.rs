//! Error taxonomy shared across the orchestrator.
//!
//! Every fallible operation in this crate returns [`OrchestratorError`]. Each variant carries a
//! stable `kind` (used by the HTTP layer to pick a status code) plus a human readable message and
//! optional structured `details` for callers that want more than prose.

use std::error::Error;
use std::fmt;

/// Stable error classification. Pattern match on this, not on the `Display` text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    AlreadyExists,
    Unavailable,
    Timeout,
    Cancelled,
    RecursionExceeded,
    SerializationError,
    Internal,
}

impl ErrorKind {
    /// HTTP status code the server layer should map this kind to.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::AlreadyExists => 409,
            ErrorKind::Unavailable => 503,
            ErrorKind::Timeout => 408,
            ErrorKind::Cancelled => 499,
            ErrorKind::RecursionExceeded => 508,
            ErrorKind::SerializationError => 500,
            ErrorKind::Internal => 500,
        }
    }
}

/// The crate-wide error type.
#[derive(Debug, Clone)]
pub struct OrchestratorError {
    pub kind: ErrorKind,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl OrchestratorError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    pub fn recursion_exceeded(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RecursionExceeded, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SerializationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// True for errors worth retrying by the governor (transient/unavailable/timeout).
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Unavailable | ErrorKind::Timeout)
    }
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for OrchestratorError {}

impl From<serde_json::Error> for OrchestratorError {
    fn from(e: serde_json::Error) -> Self {
        OrchestratorError::serialization(e.to_string())
    }
}

impl From<redis::RedisError> for OrchestratorError {
    fn from(e: redis::RedisError) -> Self {
        OrchestratorError::unavailable(format!("store unavailable: {}", e))
    }
}
