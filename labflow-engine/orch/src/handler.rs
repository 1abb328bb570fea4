use anyhow::{anyhow, Error};
use async_trait::async_trait;
use handlers::TaskHandler;
use labflow_sqlite::models::execution::ExecutionStatus;
use store::model::TaskContent;
use tracing::info;

use crate::orchestrator::Orchestrator;

pub const RUN_HANDLER_ID: &str = "pipeline-run";

/// Runs a prepared Execution when its task is dispatched. The task fails when
/// the Execution ends in ERROR.
pub struct RunHandler {
    orchestrator: Orchestrator,
}

impl RunHandler {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl TaskHandler for RunHandler {
    fn handler_id(&self) -> &str {
        RUN_HANDLER_ID
    }

    fn handler_name(&self) -> &str {
        "Pipeline run"
    }

    async fn run(&self, content: TaskContent) -> Result<(), Error> {
        let execution = self.orchestrator.run(content.execution_id).await?;
        info!(execution = execution.id, status = %execution.status, "run task finished");
        match execution.status() {
            Ok(ExecutionStatus::Ok) => Ok(()),
            _ => Err(anyhow!("Execution {} failed: {}", execution.id, execution.error)),
        }
    }
}
