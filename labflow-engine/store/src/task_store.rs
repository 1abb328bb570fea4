use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::model::{Task, TaskId};

/// Owns queued and in-flight tasks by id.
#[derive(Debug, Default)]
pub struct TaskStore {
    tasks: HashMap<TaskId, Task>,
    task_id_counter: AtomicU32,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_task(&mut self, task: Task) {
        self.tasks.insert(task.id, task);
    }

    pub fn remove_task(&mut self, task_id: &TaskId) -> Option<Task> {
        self.tasks.remove(task_id)
    }

    pub fn mut_task(&mut self, task_id: &TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(task_id)
    }

    pub fn read_task(&self, task_id: &TaskId) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Drops every task; pending result receivers observe a closed channel.
    pub fn clear(&mut self) {
        self.tasks.clear();
    }

    pub fn next_task_id(&self) -> TaskId {
        self.task_id_counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}
