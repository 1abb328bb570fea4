use diesel::r2d2::PoolError;
use labflow_access::AccessError;
use orch::OrchError;
use queue::QueueError;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Orch(#[from] OrchError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Migration error: {0}")]
    Migration(String),
}
