//! Work queue error types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkQueueError {
    #[error("Queue is closed")]
    Closed,
    #[error("task_done() called more times than items were put")]
    TooManyTaskDone,
}
