use tokio::sync::oneshot::{Receiver, Sender};

pub type TaskId = u32;

/// Mirrors the store's Execution primary key.
pub type ExecutionId = i32;

/// Payload of a run task: the Execution to run. Also the de-duplication key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskContent {
    pub execution_id: ExecutionId,
}

impl TaskContent {
    pub fn new(execution_id: ExecutionId) -> Self {
        Self { execution_id }
    }
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum TaskState {
    Pending,
    Processing,
    Done,
    Failure,
    Cancel,
}

impl TaskState {
    pub fn is_pending(&self) -> bool {
        matches!(self, TaskState::Pending)
    }
    pub fn is_done(&self) -> bool {
        matches!(self, TaskState::Done)
    }
    pub fn is_cancel(&self) -> bool {
        matches!(self, TaskState::Cancel)
    }
    pub fn is_processing(&self) -> bool {
        matches!(self, TaskState::Processing)
    }
    pub fn is_failed(&self) -> bool {
        matches!(self, TaskState::Failure)
    }
    /// Done, failed or cancelled.
    pub fn is_finished(&self) -> bool {
        matches!(self, TaskState::Done | TaskState::Failure | TaskState::Cancel)
    }
}

#[derive(Debug)]
pub struct Task {
    pub id: TaskId,
    pub handler_id: String,
    pub content: Option<TaskContent>,
    state: TaskState,
    pub ret: Option<Sender<TaskResult>>,
    pub recv: Option<Receiver<TaskResult>>,
}

/// Copies everything but the result channel halves, which are not clonable.
impl Clone for Task {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            handler_id: self.handler_id.clone(),
            content: self.content,
            state: self.state.clone(),
            ret: None,
            recv: None,
        }
    }
}

impl Task {
    pub fn new(handler_id: &str, id: TaskId, content: TaskContent) -> Self {
        let (ret, recv) = tokio::sync::oneshot::channel();
        Self {
            handler_id: handler_id.to_owned(),
            id,
            content: Some(content),
            ret: Some(ret),
            recv: Some(recv),
            state: TaskState::Pending,
        }
    }

    pub fn execution_id(&self) -> Option<ExecutionId> {
        self.content.map(|c| c.execution_id)
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }

    pub fn set_state(&mut self, status: TaskState) {
        self.state = status;
    }

    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }
}

/// Delivered once through the task's oneshot channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    pub id: TaskId,
    pub execution_id: Option<ExecutionId>,
    pub state: TaskState,
    pub error: Option<String>,
}

impl From<Task> for TaskResult {
    fn from(task: Task) -> Self {
        TaskResult {
            id: task.id,
            execution_id: task.execution_id(),
            state: task.state().clone(),
            error: None,
        }
    }
}
