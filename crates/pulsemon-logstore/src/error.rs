//! Log store error types.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for log store operations.
pub type LogResult<T> = Result<T, LogStoreError>;

/// Errors that can occur while reading or writing daily log documents.
#[derive(Debug, Error)]
pub enum LogStoreError {
    #[error("failed to create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid log document {path}: {message}")]
    Corrupt { path: PathBuf, message: String },
}
