//! Facade tying the store, the orchestrator and the task queue together.

use std::sync::Arc;

use labflow_access::edit::{self, CreateExecution};
use labflow_access::resolver::{require, EntityRef};
use labflow_sqlite::db::execution_ops;
use labflow_sqlite::models::execution::{Execution, ExecutionStatus};
use labflow_sqlite::models::Permission;
use labflow_sqlite::{establish_connection_pool, run_migrations, DbPool, ExecutionId, UserId};
use orch::{NextflowEngine, OrchError, Orchestrator, PipelineEngine, RunHandler, Upload, RUN_HANDLER_ID};
use queue::task_dispatcher::TaskDispatcher;
use queue::task_runner::TaskRunner;
use queue::QueueError;
use store::model::{Task, TaskContent, TaskResult};
use tokio::sync::oneshot::Receiver;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;

/// A new Execution plus the files to stage into its run directory.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub execution: CreateExecution,
    pub uploads: Vec<Upload>,
}

pub struct LabflowEngine {
    pool: DbPool,
    orchestrator: Orchestrator,
    dispatcher: Arc<RwLock<TaskDispatcher>>,
}

impl LabflowEngine {
    pub fn new(pool: DbPool, engine: Arc<dyn PipelineEngine>, config: orch::OrchestratorConfig) -> Self {
        let orchestrator = Orchestrator::new(pool.clone(), engine, config);
        let mut dispatcher = TaskDispatcher::new();
        dispatcher.register_handler(RunHandler::new(orchestrator.clone()));
        Self {
            pool,
            orchestrator,
            dispatcher: Arc::new(RwLock::new(dispatcher)),
        }
    }

    /// Opens the database, applies migrations and drives the configured
    /// engine executable.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let pool = establish_connection_pool(&config.database_url)?;
        {
            let mut conn = pool.get()?;
            run_migrations(&mut conn).map_err(|e| EngineError::Migration(e.to_string()))?;
        }
        let engine = Arc::new(NextflowEngine::new(config.engine_program.clone()));
        Ok(Self::new(pool, engine, config.orchestrator_config()?))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn dispatcher(&self) -> Arc<RwLock<TaskDispatcher>> {
        self.dispatcher.clone()
    }

    /// Creates the Execution on behalf of `actor` and prepares its run
    /// directory. A preparation failure leaves the Execution in ERROR.
    pub fn create_run(&self, actor: Option<UserId>, request: &RunRequest) -> Result<Execution, EngineError> {
        let execution = {
            let mut conn = self.pool.get()?;
            edit::create_execution(&mut conn, actor, &request.execution)?
        };
        self.orchestrator.prepare(execution.id, &request.uploads)?;
        let mut conn = self.pool.get()?;
        Ok(execution_ops::get_execution_by_id(&mut conn, execution.id)?)
    }

    /// Current row, if `actor` can see it.
    pub fn execution(&self, actor: Option<UserId>, execution_id: ExecutionId) -> Result<Execution, EngineError> {
        let mut conn = self.pool.get()?;
        Ok(edit::fetch_execution(&mut conn, actor, execution_id)?)
    }

    /// Queues a run of a PREPARED Execution. Needs `edit` on it. The receiver
    /// yields the task result once the run ends.
    pub async fn submit(&self, actor: Option<UserId>, execution_id: ExecutionId) -> Result<Receiver<TaskResult>, EngineError> {
        {
            let mut conn = self.pool.get()?;
            require(&mut conn, actor, EntityRef::Execution(execution_id), Permission::Edit)?;
        }
        self.enqueue(execution_id).await
    }

    async fn enqueue(&self, execution_id: ExecutionId) -> Result<Receiver<TaskResult>, EngineError> {
        let execution = {
            let mut conn = self.pool.get()?;
            execution_ops::find_execution(&mut conn, execution_id)?.ok_or(OrchError::NotFound(execution_id))?
        };
        if execution.status().ok() != Some(ExecutionStatus::Prepared) {
            return Err(OrchError::InvalidState {
                execution_id,
                status: execution.status,
                expected: ExecutionStatus::Prepared.as_str(),
            }
            .into());
        }

        let mut dispatcher = self.dispatcher.write().await;
        let mut task = Task::new(RUN_HANDLER_ID, dispatcher.next_task_id(), TaskContent::new(execution_id));
        let Some(recv) = task.recv.take() else {
            return Err(QueueError::EmptyTask.into());
        };
        let task_id = dispatcher.add_task(task)?;
        info!(execution = execution_id, task = task_id, "run queued");
        Ok(recv)
    }

    /// Queues every PREPARED Execution that has no task yet. Returns how many
    /// were queued.
    pub async fn enqueue_prepared(&self) -> Result<usize, EngineError> {
        let ids = {
            let mut conn = self.pool.get()?;
            execution_ops::list_ids_by_status(&mut conn, ExecutionStatus::Prepared)?
        };
        let mut queued = 0;
        for id in ids {
            if self.dispatcher.read().await.is_active(id) {
                continue;
            }
            match self.enqueue(id).await {
                Ok(_) => queued += 1,
                // raced with another submission or a state change
                Err(EngineError::Queue(QueueError::Duplicate(_))) | Err(EngineError::Orch(OrchError::InvalidState { .. })) => {
                    debug!(execution = id, "skipped while enqueueing prepared runs");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(queued)
    }

    /// Marks Executions left RUNNING by a previous process as ERROR. Only call
    /// this before the runner starts.
    pub fn recover_interrupted(&self) -> Result<usize, EngineError> {
        let mut conn = self.pool.get()?;
        let ids = execution_ops::list_ids_by_status(&mut conn, ExecutionStatus::Running)?;
        let mut recovered = 0;
        for id in ids {
            recovered += execution_ops::abandon_if_unfinished(
                &mut conn,
                id,
                "Worker stopped while the run was in progress",
                labflow_sqlite::now(),
            )?;
        }
        if recovered > 0 {
            warn!(count = recovered, "marked interrupted runs as ERROR");
        }
        Ok(recovered)
    }

    pub fn spawn_runner(&self) -> JoinHandle<()> {
        tokio::spawn(TaskRunner::run(self.dispatcher.clone()))
    }

    /// Stops the runner and drops queued tasks. The runner exits once the task
    /// in flight, if any, has finished.
    pub async fn shutdown(&self) {
        self.dispatcher.write().await.stop();
        info!("engine stopped");
    }
}
