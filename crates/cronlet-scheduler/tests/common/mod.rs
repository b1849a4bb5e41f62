// Shared fixtures for scheduler integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cronlet_scheduler::db::init_db;
use cronlet_scheduler::schedule::parse_cron;
use cronlet_scheduler::{
    ExecutionId, ExecutionRecorder, NewTask, Result, Scheduler, SchedulerError,
    SqliteExecutionRecorder, SqliteTaskStore, Task, TaskExecution, TaskId, TaskStore,
    TickCallback, TimerEngine, TriggerHandle,
};
use cronlet_terminal::{ExecOptions, ShellExecutor};
use rusqlite::Connection;

/// Timer engine whose ticks are fired by the test.
#[derive(Default)]
pub struct ManualTimer {
    next: AtomicU64,
    live: Mutex<HashMap<TriggerHandle, TickCallback>>,
    pub refuse_cancel: AtomicBool,
}

impl ManualTimer {
    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    /// Forget every trigger without the scheduler's involvement, as the real
    /// engine does when a schedule has no instants left.
    pub fn exhaust_all(&self) {
        self.live.lock().unwrap().clear();
    }

    /// Invoke every live trigger once, as if its next instant arrived.
    pub fn fire_all(&self) {
        let callbacks: Vec<_> = self.live.lock().unwrap().values().cloned().collect();
        for cb in callbacks {
            cb();
        }
    }
}

impl TimerEngine for ManualTimer {
    fn schedule(&self, cron_expr: &str, callback: TickCallback) -> Result<TriggerHandle> {
        parse_cron(cron_expr)?;
        let handle = TriggerHandle::from_raw(self.next.fetch_add(1, Ordering::SeqCst));
        self.live.lock().unwrap().insert(handle, callback);
        Ok(handle)
    }

    fn cancel(&self, handle: TriggerHandle) -> Result<()> {
        if self.refuse_cancel.load(Ordering::SeqCst) {
            return Err(SchedulerError::Runtime("cancel refused".into()));
        }
        self.live
            .lock()
            .unwrap()
            .remove(&handle)
            .map(|_| ())
            .ok_or(SchedulerError::TriggerNotFound { handle })
    }

    fn shutdown_all(&self) {
        self.live.lock().unwrap().clear();
    }
}

/// Task store that can be told to fail writes.
pub struct FlakyStore {
    pub inner: Arc<SqliteTaskStore>,
    pub fail_updates: AtomicBool,
}

impl TaskStore for FlakyStore {
    fn list_all_enabled(&self) -> Result<Vec<Task>> {
        self.inner.list_all_enabled()
    }

    fn get_by_id(&self, id: TaskId) -> Result<Task> {
        self.inner.get_by_id(id)
    }

    fn update(&self, task: &Task) -> Result<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(SchedulerError::Persistence("disk full".into()));
        }
        self.inner.update(task)
    }
}

pub struct Fixture {
    pub tasks: Arc<SqliteTaskStore>,
    pub executions: Arc<SqliteExecutionRecorder>,
    pub timer: Arc<ManualTimer>,
    pub scheduler: Scheduler,
}

pub fn stores() -> (Arc<SqliteTaskStore>, Arc<SqliteExecutionRecorder>) {
    let conn = Connection::open_in_memory().unwrap();
    init_db(&conn).unwrap();
    let db = Arc::new(Mutex::new(conn));
    (
        Arc::new(SqliteTaskStore::with_shared(Arc::clone(&db))),
        Arc::new(SqliteExecutionRecorder::with_shared(db)),
    )
}

pub fn executor() -> Arc<ShellExecutor> {
    Arc::new(ShellExecutor::new(ExecOptions::default()))
}

/// Must be called inside a Tokio runtime.
pub fn fixture() -> Fixture {
    let (tasks, executions) = stores();
    let timer = Arc::new(ManualTimer::default());
    let scheduler = Scheduler::new(
        tasks.clone(),
        executions.clone(),
        executor(),
        timer.clone(),
    )
    .unwrap();
    Fixture {
        tasks,
        executions,
        timer,
        scheduler,
    }
}

impl Fixture {
    pub fn task(&self, name: &str, cron: &str, command: &str) -> Task {
        self.tasks.create(&NewTask::new(name, cron, command)).unwrap()
    }
}

/// Poll until the execution leaves `Running`, failing the test after 5s.
pub async fn wait_terminal(rec: &dyn ExecutionRecorder, id: ExecutionId) -> TaskExecution {
    for _ in 0..250 {
        let exec = rec.get_by_id(id).unwrap();
        if exec.status.is_terminal() {
            return exec;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("execution {id} never finished");
}

/// Poll until `task_id` has at least one execution, failing after 5s.
pub async fn wait_first_execution(rec: &dyn ExecutionRecorder, task_id: TaskId) -> TaskExecution {
    for _ in 0..250 {
        if let Some(exec) = rec.list_for_task(task_id, 1).unwrap().into_iter().next() {
            return exec;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("task {task_id} never executed");
}
