use thiserror::Error;

use crate::timer::TriggerHandle;
use crate::types::{ExecutionId, TaskId};

/// Errors that can occur within the scheduler subsystem.
///
/// Command failures are not represented here: a command that fails to launch
/// or exits non-zero is recorded on its execution row as `Failed`.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A store could not be read or written for a non-SQL reason
    /// (poisoned connection lock, unreadable row).
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// The cron expression was rejected by the timer engine.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// No live task with the given ID exists in the store.
    #[error("Task not found: {id}")]
    TaskNotFound { id: TaskId },

    /// No execution record with the given ID exists.
    #[error("Execution not found: {id}")]
    ExecutionNotFound { id: ExecutionId },

    /// The timer engine does not know this handle (already cancelled or shut down).
    #[error("Trigger not found: {handle}")]
    TriggerNotFound { handle: TriggerHandle },

    /// A uniqueness constraint was violated (e.g. duplicate task name).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A task definition failed validation.
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// No Tokio runtime is available, or the timer engine was shut down.
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl SchedulerError {
    /// Short error code string for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            SchedulerError::Database(_) | SchedulerError::Persistence(_) => "PERSISTENCE_ERROR",
            SchedulerError::InvalidSchedule(_) => "INVALID_SCHEDULE",
            SchedulerError::TaskNotFound { .. } | SchedulerError::ExecutionNotFound { .. } => {
                "NOT_FOUND"
            }
            SchedulerError::TriggerNotFound { .. } => "TRIGGER_NOT_FOUND",
            SchedulerError::Conflict(_) => "CONFLICT",
            SchedulerError::InvalidTask(_) => "INVALID_TASK",
            SchedulerError::Runtime(_) => "RUNTIME_ERROR",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SchedulerError::TaskNotFound { .. } | SchedulerError::ExecutionNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
