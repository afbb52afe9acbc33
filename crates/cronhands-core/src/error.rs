//! Error types for the scheduling engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by scheduler operations.
///
/// The first four kinds are validation failures raised before any state is
/// touched. `Unexpected` covers infrastructure failures.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Malformed cron expression or payload.
    #[error("Incorrect job request: {0}")]
    IncorrectJobRequest(String),

    /// A job with the same name is already registered.
    #[error("Job '{0}' already exists")]
    JobAlreadyExists(String),

    /// No job registered under this name.
    #[error("Job '{0}' is not found")]
    JobNotFound(String),

    /// The job is executing (or being mutated) right now.
    #[error("Job '{0}' is currently running")]
    JobCurrentlyRunning(String),

    /// Infrastructure failure.
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Error kind tag handed to the admin layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    IncorrectJobRequest,
    JobAlreadyExists,
    JobNotFound,
    JobCurrentlyRunning,
    Unexpected,
}

impl SchedulerError {
    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulerError::IncorrectJobRequest(_) => ErrorKind::IncorrectJobRequest,
            SchedulerError::JobAlreadyExists(_) => ErrorKind::JobAlreadyExists,
            SchedulerError::JobNotFound(_) => ErrorKind::JobNotFound,
            SchedulerError::JobCurrentlyRunning(_) => ErrorKind::JobCurrentlyRunning,
            SchedulerError::Unexpected(_) => ErrorKind::Unexpected,
        }
    }
}

/// Errors raised by a history sink.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Storage backend failure.
    #[error("Database error: {0}")]
    Database(String),

    /// Stored record could not be decoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<HistoryError> for SchedulerError {
    fn from(err: HistoryError) -> Self {
        tracing::error!("History sink failure: {}", err);
        SchedulerError::Unexpected(err.to_string())
    }
}

/// Failure raised by a managed task.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The task body failed.
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Undoing a failed execution failed.
    #[error("Rollback failed: {0}")]
    Rollback(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let cases = [
            (
                SchedulerError::IncorrectJobRequest("bad cron".to_string()),
                ErrorKind::IncorrectJobRequest,
            ),
            (
                SchedulerError::JobAlreadyExists("a".to_string()),
                ErrorKind::JobAlreadyExists,
            ),
            (SchedulerError::JobNotFound("a".to_string()), ErrorKind::JobNotFound),
            (
                SchedulerError::JobCurrentlyRunning("a".to_string()),
                ErrorKind::JobCurrentlyRunning,
            ),
            (SchedulerError::Unexpected("boom".to_string()), ErrorKind::Unexpected),
        ];

        for (err, kind) in cases {
            assert_eq!(err.kind(), kind);
        }
    }

    #[test]
    fn test_error_display_names_job() {
        let err = SchedulerError::JobCurrentlyRunning("nightly-backup".to_string());
        assert_eq!(err.to_string(), "Job 'nightly-backup' is currently running");
    }

    #[test]
    fn test_history_error_becomes_unexpected() {
        let err: SchedulerError = HistoryError::Database("disk full".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Unexpected);
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_task_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "pipe closed");
        let err = TaskError::from(io_err);
        assert!(err.to_string().contains("pipe closed"));
    }
}
