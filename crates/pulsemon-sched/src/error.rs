//! Scheduler error types.

use thiserror::Error;

/// Result type alias for scheduler operations.
pub type SchedResult<T> = Result<T, SchedulerError>;

/// Errors that can occur during scheduling operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("service not found: {0}")]
    ServiceNotFound(String),
}
