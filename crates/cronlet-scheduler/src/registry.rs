//! In-memory map from task id to its live trigger handle.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::timer::TriggerHandle;
use crate::types::TaskId;

/// Which tasks are currently scheduled, and under which trigger.
///
/// One reader/writer lock guards the whole map. Every operation is a plain
/// map access, so the lock is never held across I/O or command execution.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<TaskId, TriggerHandle>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `handle` for `task_id`, returning the handle it displaced.
    ///
    /// The caller owns the displaced handle and must cancel it, otherwise its
    /// trigger keeps firing without being tracked here.
    pub fn register(&self, task_id: TaskId, handle: TriggerHandle) -> Option<TriggerHandle> {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task_id, handle)
    }

    /// Remove whatever handle is stored for `task_id`. No-op if absent.
    pub fn unregister(&self, task_id: TaskId) -> Option<TriggerHandle> {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&task_id)
    }

    /// Remove the entry for `task_id` only if it still maps to `handle`.
    ///
    /// A concurrent restart may already have replaced the handle; that newer
    /// entry must survive.
    pub fn unregister_if(&self, task_id: TaskId, handle: TriggerHandle) -> bool {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if jobs.get(&task_id) == Some(&handle) {
            jobs.remove(&task_id);
            true
        } else {
            false
        }
    }

    pub fn lookup(&self, task_id: TaskId) -> Option<TriggerHandle> {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&task_id)
            .copied()
    }

    pub fn contains(&self, task_id: TaskId) -> bool {
        self.lookup(task_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scheduled task ids, ascending.
    pub fn task_ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<_> = self
            .jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Drop every entry, returning what was there.
    pub fn clear(&self) -> Vec<(TaskId, TriggerHandle)> {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect()
    }
}
