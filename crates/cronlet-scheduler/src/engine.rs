use std::sync::Arc;

use cronlet_terminal::CommandExecutor;
use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::{
    error::{Result, SchedulerError},
    recorder::ExecutionRecorder,
    registry::JobRegistry,
    runner::ExecutionRunner,
    store::TaskStore,
    timer::{TickCallback, TimerEngine},
    types::{ExecutionId, ExecutionTrigger, Task, TaskId, TaskStatus},
};

/// Outcome of [`Scheduler::load_and_start_tasks`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub started: usize,
    pub failed: usize,
}

/// Binds persisted tasks to live triggers and runs them.
///
/// Owns the [`JobRegistry`]; every other piece of state lives in the stores.
/// All public methods are safe to call concurrently with each other and with
/// trigger firings.
pub struct Scheduler {
    tasks: Arc<dyn TaskStore>,
    timer: Arc<dyn TimerEngine>,
    registry: JobRegistry,
    runner: ExecutionRunner,
}

impl Scheduler {
    /// Build a scheduler on the current Tokio runtime.
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        executions: Arc<dyn ExecutionRecorder>,
        executor: Arc<dyn CommandExecutor>,
        timer: Arc<dyn TimerEngine>,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| SchedulerError::Runtime(e.to_string()))?;
        Ok(Self::with_runtime(tasks, executions, executor, timer, runtime))
    }

    /// Build a scheduler whose background executions run on `runtime`.
    pub fn with_runtime(
        tasks: Arc<dyn TaskStore>,
        executions: Arc<dyn ExecutionRecorder>,
        executor: Arc<dyn CommandExecutor>,
        timer: Arc<dyn TimerEngine>,
        runtime: Handle,
    ) -> Self {
        let runner = ExecutionRunner::new(Arc::clone(&tasks), executions, executor, runtime);
        Self {
            tasks,
            timer,
            registry: JobRegistry::new(),
            runner,
        }
    }

    /// Start every enabled task. A task that fails to start is logged and
    /// skipped; only a failure to list tasks is returned.
    pub fn load_and_start_tasks(&self) -> Result<LoadReport> {
        let tasks = self.tasks.list_all_enabled()?;
        let mut report = LoadReport::default();

        for mut task in tasks {
            match self.start_task(&mut task) {
                Ok(()) => {
                    info!(task_id = task.id, name = %task.name, "started task");
                    report.started += 1;
                }
                Err(e) => {
                    warn!(task_id = task.id, error = %e, "failed to start task");
                    report.failed += 1;
                }
            }
        }

        info!(started = report.started, failed = report.failed, "tasks loaded");
        Ok(report)
    }

    /// (Re)start `task`: drop any existing trigger, schedule a new one and
    /// mark the task `Running`.
    ///
    /// If the trigger cannot be created the error is returned and
    /// `task.status` is left as it was. If the status cannot be persisted the
    /// new trigger is torn down again, so a failed start never leaves a
    /// registry entry behind.
    pub fn start_task(&self, task: &mut Task) -> Result<()> {
        if let Err(e) = self.stop_task_by_id(task.id) {
            warn!(task_id = task.id, error = %e, "failed to stop existing trigger");
        }

        let runner = self.runner.clone();
        let task_id = task.id;
        let callback: TickCallback = Arc::new(move || runner.on_tick(task_id));
        let handle = self.timer.schedule(&task.cron_expr, callback)?;

        if let Some(displaced) = self.registry.register(task.id, handle) {
            // a concurrent start got here first; keep only our trigger
            if displaced != handle {
                if let Err(e) = self.timer.cancel(displaced) {
                    warn!(task_id, %displaced, error = %e, "failed to cancel displaced trigger");
                }
            }
        }

        let previous = task.status;
        task.status = TaskStatus::Running;
        if let Err(e) = self.tasks.update(task) {
            task.status = previous;
            if self.registry.unregister_if(task_id, handle) {
                if let Err(cancel_err) = self.timer.cancel(handle) {
                    warn!(task_id, %handle, error = %cancel_err, "failed to roll back trigger");
                }
            }
            return Err(e);
        }
        Ok(())
    }

    /// Cancel the task's trigger (if any) and mark it `Stopped`.
    ///
    /// Succeeds when nothing is registered. A handle the timer engine no
    /// longer knows (its schedule ran out) is dropped from the registry. Any
    /// other cancel failure is returned and the registry keeps the handle.
    pub fn stop_task_by_id(&self, task_id: TaskId) -> Result<()> {
        if let Some(handle) = self.registry.lookup(task_id) {
            match self.timer.cancel(handle) {
                Ok(()) => info!(task_id, %handle, "trigger removed"),
                Err(SchedulerError::TriggerNotFound { .. }) => {
                    info!(task_id, %handle, "trigger already finished");
                }
                Err(e) => return Err(e),
            }
            self.registry.unregister_if(task_id, handle);
        }

        let mut task = self.tasks.get_by_id(task_id)?;
        task.status = TaskStatus::Stopped;
        self.tasks.update(&task)
    }

    /// Run a task once, right now, outside its schedule.
    ///
    /// Returns the new execution id as soon as the `Running` record exists;
    /// the command finishes in the background.
    pub fn execute_task_now(&self, task_id: TaskId) -> Result<ExecutionId> {
        self.runner.begin(task_id, ExecutionTrigger::Manual)
    }

    /// Stop scheduling new work. In-flight executions keep running and
    /// persisted task statuses are left as they are.
    pub fn stop(&self) {
        self.timer.shutdown_all();
        let dropped = self.registry.clear();
        info!(triggers = dropped.len(), "scheduler stopped");
    }

    /// Whether `task_id` currently has a live trigger.
    pub fn is_scheduled(&self, task_id: TaskId) -> bool {
        self.registry.contains(task_id)
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }
}
