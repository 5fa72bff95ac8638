//! Error types for VMmanager operations.
//!
//! This module provides the error taxonomy shared by the transport, the retrying
//! fetcher, the task poller and the client facade.

use std::time::Duration;

use thiserror::Error;

use crate::ids::TaskId;

/// Main error type for VMmanager operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The service could not be reached or answered with a 5xx status
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// The service rejected the credentials or token
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Response body did not have the expected JSON shape
    #[error("Failed to decode response: {0}")]
    DecodeError(String),

    /// A mutating call returned no body at all
    #[error("Empty response for {0}")]
    EmptyResponse(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// A well-formed record lacks a required field
    #[error("Field missing: {0}")]
    FieldMissing(String),

    /// A configuration document lacks its `data` payload
    #[error("{0} CONFIG not readable")]
    ConfigNotReadable(String),

    /// The service embedded an error object in a mutation response
    #[error("Error response: {0}")]
    RemoteTaskError(String),

    /// A deferred task did not complete within the wait budget
    #[error("Wait timeout for task {task} after {}s", waited.as_secs())]
    TaskTimeout {
        /// Task that was being awaited
        task: TaskId,
        /// Budget that was spent waiting
        waited: Duration,
    },

    /// A deferred task reached a status other than `complete`
    #[error("Task {task} finished with status `{status}`")]
    TaskFailed {
        /// Task that was being awaited
        task: TaskId,
        /// Terminal status reported by the service
        status: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Specialized result type for VMmanager operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::HttpError(_) => "HTTP_ERROR",
            Self::AuthenticationFailed(_) => "AUTHENTICATION_FAILED",
            Self::DecodeError(_) => "DECODE_ERROR",
            Self::EmptyResponse(_) => "EMPTY_RESPONSE",
            Self::NotFound(_) => "NOT_FOUND",
            Self::FieldMissing(_) => "FIELD_MISSING",
            Self::ConfigNotReadable(_) => "CONFIG_NOT_READABLE",
            Self::RemoteTaskError(_) => "REMOTE_TASK_ERROR",
            Self::TaskTimeout { .. } => "TASK_TIMEOUT",
            Self::TaskFailed { .. } => "TASK_FAILED",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
            Self::ValidationError(_) => "VALIDATION_ERROR",
        }
    }

    /// Returns true for transport-class failures that may succeed on a later attempt.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_) | Self::HttpError(_))
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::ServiceUnavailable(err.to_string())
        } else if err.is_decode() {
            Self::DecodeError(err.to_string())
        } else {
            Self::HttpError(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::DecodeError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ValidationError(err.to_string())
    }
}
