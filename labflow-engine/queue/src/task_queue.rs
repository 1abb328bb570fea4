use std::collections::VecDeque;

use tracing::warn;

use store::model::{ExecutionId, Task, TaskId};

/// Queue entry; the task itself lives in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTask {
    pub id: TaskId,
    pub execution_id: ExecutionId,
}

/// First-in first-out list of pending run tasks.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: VecDeque<PendingTask>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: &Task) {
        let Some(execution_id) = task.execution_id() else {
            warn!("The task:{} with empty content will be not executed", task.id);
            return;
        };
        debug_assert!(self.tasks.back().map(|last| task.id > last.id).unwrap_or(true));
        self.tasks.push_back(PendingTask {
            id: task.id,
            execution_id,
        });
    }

    pub fn pop(&mut self) -> Option<PendingTask> {
        self.tasks.pop_front()
    }

    pub fn remove(&mut self, task_id: TaskId) -> Option<PendingTask> {
        let pos = self.tasks.iter().position(|p| p.id == task_id)?;
        self.tasks.remove(pos)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}
