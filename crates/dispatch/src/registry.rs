use std::{collections::HashMap, sync::RwLock};

use serde::Serialize;

use crate::{
    error::{DispatchError, Result},
    types::{Task, TaskId, TaskStatus},
};

/// Number of tasks in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub queued: usize,
    pub processing: usize,
    pub sent: usize,
    pub error: usize,
}

impl StatusCounts {
    fn add(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Queued => self.queued += 1,
            TaskStatus::Processing => self.processing += 1,
            TaskStatus::Sent => self.sent += 1,
            TaskStatus::Error => self.error += 1,
        }
    }
}

#[derive(Default)]
struct Inner {
    tasks: HashMap<TaskId, Task>,
    /// Admission order, for snapshots.
    order: Vec<TaskId>,
}

/// Append-only task store. Entries are never removed for the life of the
/// process; readers always see whole records.
#[derive(Default)]
pub struct TaskRegistry {
    inner: RwLock<Inner>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, task: Task) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if inner.tasks.contains_key(&task.id) {
            return Err(DispatchError::DuplicateTask {
                id: task.id.to_string(),
            });
        }
        inner.order.push(task.id.clone());
        inner.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner.tasks.get(id).cloned()
    }

    /// Apply `mutator` to a copy of the task and commit only if it succeeds.
    ///
    /// Returns the committed record.
    pub fn update<F>(&self, id: &str, mutator: F) -> Result<Task>
    where
        F: FnOnce(&mut Task) -> Result<()>,
    {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let current = inner
            .tasks
            .get_mut(id)
            .ok_or_else(|| DispatchError::task_not_found(id))?;
        let mut next = current.clone();
        mutator(&mut next)?;
        *current = next.clone();
        Ok(next)
    }

    /// All tasks in admission order.
    pub fn snapshot(&self) -> Vec<Task> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .order
            .iter()
            .filter_map(|id| inner.tasks.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .tasks
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count_by_status(&self) -> StatusCounts {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut counts = StatusCounts::default();
        for task in inner.tasks.values() {
            counts.add(task.status);
        }
        counts
    }
}
