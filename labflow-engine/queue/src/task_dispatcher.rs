use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::oneshot::Sender;
use tokio::sync::watch;
use tracing::{debug, error, trace, warn};

use crate::task_queue::TaskQueue;
use crate::QueueError;
use handlers::{TaskHandler, TaskHandlerId};
use store::model::{ExecutionId, Task, TaskId, TaskResult, TaskState};
use store::task_store::TaskStore;

/// Owns the pending queue and the task store, and guarantees at most one
/// queued-or-running task per Execution.
pub struct TaskDispatcher {
    pub queue: TaskQueue,
    pub store: TaskStore,

    handlers: HashMap<TaskHandlerId, Arc<dyn TaskHandler>>,
    active: HashMap<ExecutionId, TaskId>,

    notifier: watch::Sender<bool>,
    pub(crate) notifier_rx: Option<watch::Receiver<bool>>,
}

/// A task taken off the queue, ready to run without holding the dispatcher.
pub struct ClaimedTask {
    task: Task,
    handler: Option<Arc<dyn TaskHandler>>,
    ret: Option<Sender<TaskResult>>,
}

impl ClaimedTask {
    pub fn id(&self) -> TaskId {
        self.task.id
    }

    /// Runs the handler, delivers the result to the submitter and returns a
    /// copy for bookkeeping.
    pub async fn execute(mut self) -> TaskResult {
        let mut error_message = None;
        match (self.handler.as_ref(), self.task.content.take()) {
            (Some(handler), Some(content)) => {
                self.task.set_state(TaskState::Processing);
                trace!("{} task is running, id={}", handler.handler_id(), self.task.id);
                match handler.run(content).await {
                    Ok(()) => {
                        trace!("{} task is done, id={}", handler.handler_id(), self.task.id);
                        self.task.set_state(TaskState::Done);
                    }
                    Err(e) => {
                        warn!("{} task failed, id={}: {:#}", handler.handler_id(), self.task.id, e);
                        error_message = Some(format!("{e:#}"));
                        self.task.set_state(TaskState::Failure);
                    }
                }
                // content is only needed for the result's execution id
                self.task.content = Some(content);
            }
            (None, content) => {
                self.task.content = content;
                error!("Unknown handler_id: {} => cancel task id={}", self.task.handler_id, self.task.id);
                self.task.set_state(TaskState::Cancel);
            }
            (Some(_), None) => {
                self.task.set_state(TaskState::Cancel);
            }
        }

        let ret = self.ret.take();
        let mut result = TaskResult::from(self.task);
        result.error = error_message;
        if let Some(ret) = ret {
            let _ = ret.send(result.clone());
        }
        result
    }
}

impl TaskDispatcher {
    pub fn new() -> Self {
        let (notifier, notifier_rx) = watch::channel(false);
        Self {
            queue: TaskQueue::new(),
            store: TaskStore::new(),
            handlers: HashMap::new(),
            active: HashMap::new(),
            notifier,
            notifier_rx: Some(notifier_rx),
        }
    }

    pub fn register_handler<T>(&mut self, handler: T)
    where
        T: TaskHandler,
    {
        let handler_id = handler.handler_id().to_owned();
        self.handlers.insert(handler_id, Arc::new(handler));
    }

    pub fn unregister_handler<T: AsRef<str>>(&mut self, handler_id: T) {
        if let Some(handler) = self.handlers.remove(handler_id.as_ref()) {
            trace!("Handler {} is unregistered", handler.handler_id());
        }
    }

    /// Stops the runner and drops every queued task. Stopping is final: later
    /// notifications never clear it.
    pub fn stop(&mut self) {
        self.notifier.send_replace(true);
        self.queue.clear();
        self.store.clear();
        self.active.clear();
    }

    /// Queues a task unless its Execution already has one queued or running.
    pub fn add_task(&mut self, task: Task) -> Result<TaskId, QueueError> {
        if self.is_stopped() {
            return Err(QueueError::Stopped);
        }
        if task.state().is_finished() {
            warn!("Should not add a task which state is finished");
            return Err(QueueError::AlreadyFinished);
        }
        let execution_id = task.execution_id().ok_or(QueueError::EmptyTask)?;
        if self.active.contains_key(&execution_id) {
            debug!(execution = execution_id, "rejecting duplicate run submission");
            return Err(QueueError::Duplicate(execution_id));
        }
        trace!("Add task: handler:{}, task:{:?}", task.handler_id, task.content);

        let task_id = task.id;
        self.active.insert(execution_id, task_id);
        self.queue.push(&task);
        self.store.insert_task(task);
        self.notify();
        Ok(task_id)
    }

    /// Pops the oldest pending task. The Execution stays marked active until
    /// `complete` is called with the result.
    pub fn claim_next(&mut self) -> Option<ClaimedTask> {
        let pending = self.queue.pop()?;
        let Some(mut task) = self.store.remove_task(&pending.id) else {
            self.active.remove(&pending.execution_id);
            return None;
        };
        let ret = task.ret.take();
        let handler = self.handlers.get(&task.handler_id).cloned();
        Some(ClaimedTask { task, handler, ret })
    }

    pub fn complete(&mut self, result: &TaskResult) {
        if let Some(execution_id) = result.execution_id {
            if self.active.get(&execution_id) == Some(&result.id) {
                self.active.remove(&execution_id);
            }
        }
        self.notify();
    }

    /// Claims, runs and completes one task while holding `&mut self`.
    pub async fn process_next_task(&mut self) -> Option<TaskResult> {
        let claimed = self.claim_next()?;
        let result = claimed.execute().await;
        self.complete(&result);
        Some(result)
    }

    pub fn read_task(&self, task_id: &TaskId) -> Option<&Task> {
        self.store.read_task(task_id)
    }

    /// Cancels a task that has not started yet.
    pub fn cancel_task(&mut self, task_id: TaskId) -> bool {
        let Some(pending) = self.queue.remove(task_id) else {
            return false;
        };
        self.active.remove(&pending.execution_id);
        if let Some(mut task) = self.store.remove_task(&task_id) {
            task.set_state(TaskState::Cancel);
            if let Some(ret) = task.ret.take() {
                let _ = ret.send(task.into());
            }
        }
        true
    }

    pub fn is_active(&self, execution_id: ExecutionId) -> bool {
        self.active.contains_key(&execution_id)
    }

    pub fn next_task_id(&self) -> TaskId {
        self.store.next_task_id()
    }

    pub fn is_stopped(&self) -> bool {
        *self.notifier.borrow()
    }

    /// Wakes the runner, unless it was stopped.
    pub(crate) fn notify(&self) {
        self.notifier.send_if_modified(|stopped| !*stopped);
    }
}

impl Default for TaskDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
