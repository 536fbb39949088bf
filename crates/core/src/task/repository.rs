//! Persistence of task records.

use std::sync::Arc;

use super::{Task, TaskType};
use crate::store::{get_json, set_json, KvStore, StoreError};

/// Stores one JSON record per task, keyed by its code.
pub struct TaskRepository {
    store: Arc<dyn KvStore>,
}

impl TaskRepository {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    fn key(name: &str) -> String {
        format!("task:{}", name)
    }

    pub fn save(&self, task: &Task) -> Result<(), StoreError> {
        set_json(self.store.as_ref(), &Self::key(&task.name), task)
    }

    pub fn get(&self, name: &str) -> Result<Option<Task>, StoreError> {
        get_json(self.store.as_ref(), &Self::key(name))
    }

    /// Look up a task and require it to be of `task_type`.
    pub fn get_typed(&self, task_type: TaskType, name: &str) -> Result<Option<Task>, StoreError> {
        Ok(self.get(name)?.filter(|task| task.task_type == task_type))
    }
}
