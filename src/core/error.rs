use super::envelope::HttpResponse;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DistributorError {
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Failed to read request body: {0}")]
    BodyRead(String),

    #[error("Replica directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("Failed to get client for replica {addr}: {message}")]
    ClientPool { addr: String, message: String },

    #[error("Distributor is not running (state: {0})")]
    NotRunning(String),

    #[error("Invalid lifecycle transition: {0}")]
    InvalidTransition(String),

    #[error("Subservice '{name}' failed: {message}")]
    Subservice { name: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

pub type Result<T> = std::result::Result<T, DistributorError>;

impl<T> From<std::sync::PoisonError<T>> for DistributorError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

/// Outcome of a failed replica call, classified where the failure happened.
///
/// A replica either handed back a structured HTTP-shaped error that should be
/// relayed to the caller as-is, or failed with nothing more than a message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplicaFailure {
    #[error("replica responded with status {}", .0.code)]
    Response(HttpResponse),

    #[error("{0}")]
    Message(String),
}

impl ReplicaFailure {
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub fn is_response(&self) -> bool {
        matches!(self, Self::Response(_))
    }

    /// Prefixes plain messages with call-site context. Structured responses are left untouched.
    pub fn with_context(self, context: impl std::fmt::Display) -> Self {
        match self {
            Self::Message(message) => Self::Message(format!("{context}: {message}")),
            response => response,
        }
    }
}
