//! Error types for the provider

use std::fmt;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

/// Remote operation a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Retrieve,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            Operation::Create => "create",
            Operation::Retrieve => "retrieve",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(verb)
    }
}

/// Main error type for the provider
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// `body` holds the API's `detail` message when one was sent
    #[error("API error: {status} - {body}")]
    ApiError { status: StatusCode, body: String },

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("failed to {op} deployment: {source}")]
    OperationFailed {
        op: Operation,
        #[source]
        source: Box<ProviderError>,
    },

    #[error("timeout after {elapsed:?} waiting for deployment: {last}")]
    Timeout { elapsed: Duration, last: String },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProviderError {
    /// Wrap an error with the operation it came from
    pub fn operation(op: Operation, source: ProviderError) -> Self {
        ProviderError::OperationFailed {
            op,
            source: Box::new(source),
        }
    }

    /// HTTP status attached to this error, looking through operation wrappers
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ProviderError::ApiError { status, .. } => Some(*status),
            ProviderError::HttpError(e) => e.status(),
            ProviderError::OperationFailed { source, .. } => source.status(),
            _ => None,
        }
    }

    /// Whether the remote reported the resource as absent
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// Whether the failure looks like a passing network or server condition
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::HttpError(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(is_transient_status)
            }
            ProviderError::ApiError { status, .. } => is_transient_status(*status),
            ProviderError::OperationFailed { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

impl From<anyhow::Error> for ProviderError {
    fn from(err: anyhow::Error) -> Self {
        ProviderError::Internal(err.to_string())
    }
}
