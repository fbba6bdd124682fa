//! Error types for healthcheck-storage

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A SQLite failure with the operation that hit it
    #[error("{context}: {source}")]
    Query {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse error classification surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    StorageFailure,
    Cancelled,
}

impl StorageError {
    pub fn query(context: impl Into<String>, source: rusqlite::Error) -> Self {
        StorageError::Query {
            context: context.into(),
            source,
        }
    }

    /// Classify this error for the calling layer
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound(_) => ErrorKind::NotFound,
            StorageError::InvalidInput(_) | StorageError::Config(_) => ErrorKind::InvalidArgument,
            StorageError::Cancelled(_) => ErrorKind::Cancelled,
            StorageError::Database(_)
            | StorageError::Query { .. }
            | StorageError::Io(_)
            | StorageError::Json(_)
            | StorageError::Internal(_) => ErrorKind::StorageFailure,
        }
    }

    /// True for lock conflicts a caller may retry (SQLITE_BUSY / SQLITE_LOCKED)
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Database(e) | StorageError::Query { source: e, .. } => matches!(
                e.sqlite_error_code(),
                Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked)
            ),
            _ => false,
        }
    }
}
