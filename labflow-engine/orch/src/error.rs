use diesel::r2d2::PoolError;
use labflow_sqlite::ExecutionId;
use thiserror::Error;

/// Errors returned to whoever drives the orchestrator. Failures during a run
/// are not errors here: they end up on the Execution row.
#[derive(Debug, Error)]
pub enum OrchError {
    #[error("execution: Execution {0} does not exist")]
    NotFound(ExecutionId),

    #[error("status: Execution {execution_id} is {status}, expected {expected}")]
    InvalidState {
        execution_id: ExecutionId,
        status: String,
        expected: &'static str,
    },

    #[error("execution: failed to prepare Execution {execution_id}: {message}")]
    PreparationFailure {
        execution_id: ExecutionId,
        message: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] PoolError),
}
