pub mod task_queue;
pub mod task_dispatcher;
pub mod task_runner;

use store::model::ExecutionId;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Execution {0} is already queued or running")]
    Duplicate(ExecutionId),
    #[error("task has no content")]
    EmptyTask,
    #[error("task was already finished")]
    AlreadyFinished,
    #[error("dispatcher is stopped")]
    Stopped,
}
