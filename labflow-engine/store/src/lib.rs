pub mod model;
pub mod task_store;

#[cfg(test)]
mod tests {
    use super::model::{Task, TaskContent, TaskState};
    use super::task_store::TaskStore;

    #[test]
    fn test_insert_and_read() {
        let mut store = TaskStore::new();
        let task = Task::new("pipeline-run", 1, TaskContent::new(7));
        store.insert_task(task);

        let t = store.read_task(&1).expect("task was inserted");
        assert_eq!(t.id, 1);
        assert_eq!(t.state(), &TaskState::Pending, "new tasks start pending");
        assert_eq!(t.content.map(|c| c.execution_id), Some(7));
    }

    #[test]
    fn test_remove_task() {
        let mut store = TaskStore::new();
        store.insert_task(Task::new("pipeline-run", 2, TaskContent::new(3)));

        let removed = store.remove_task(&2).expect("existing task is removed");
        assert_eq!(removed.id, 2);
        assert!(store.read_task(&2).is_none());
        assert!(store.remove_task(&2).is_none());
    }

    #[test]
    fn test_clear_store() {
        let mut store = TaskStore::new();
        store.insert_task(Task::new("pipeline-run", 10, TaskContent::new(1)));
        store.insert_task(Task::new("pipeline-run", 11, TaskContent::new(2)));

        store.clear();
        assert!(store.is_empty());
        assert!(store.read_task(&10).is_none());
    }

    #[test]
    fn test_next_task_id() {
        let store = TaskStore::new();
        let id1 = store.next_task_id();
        let id2 = store.next_task_id();
        assert!(id2 > id1, "task ids ascend");
    }
}
