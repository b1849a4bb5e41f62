//! The execution path shared by scheduled ticks and manual "run now" calls:
//! create a `Running` record, run the command in a spawned task, then write
//! the terminal state with a single update.

use std::sync::Arc;

use chrono::Utc;
use cronlet_terminal::{CommandExecutor, ExecResult, TerminalError};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::recorder::ExecutionRecorder;
use crate::store::TaskStore;
use crate::types::{
    ExecutionId, ExecutionOutcome, ExecutionTrigger, NewExecution, TaskExecution, TaskId,
};

/// Cheap to clone; each tick callback owns one.
#[derive(Clone)]
pub struct ExecutionRunner {
    tasks: Arc<dyn TaskStore>,
    executions: Arc<dyn ExecutionRecorder>,
    executor: Arc<dyn CommandExecutor>,
    runtime: Handle,
}

impl ExecutionRunner {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        executions: Arc<dyn ExecutionRecorder>,
        executor: Arc<dyn CommandExecutor>,
        runtime: Handle,
    ) -> Self {
        Self {
            tasks,
            executions,
            executor,
            runtime,
        }
    }

    /// Record a new `Running` execution for `task_id` and hand the command to
    /// a background task. Returns as soon as the record exists.
    ///
    /// # Errors
    ///
    /// `TaskNotFound` or a persistence error; in both cases nothing was spawned.
    pub fn begin(&self, task_id: TaskId, trigger: ExecutionTrigger) -> Result<ExecutionId> {
        let task = self.tasks.get_by_id(task_id)?;
        let execution = self
            .executions
            .create(NewExecution::starting_now(task_id, trigger))?;
        let execution_id = execution.id;
        info!(task_id, execution_id, %trigger, "execution started");

        self.spawn_completion(execution, task.command);
        Ok(execution_id)
    }

    /// Timer callback body. A tick has no caller to report to, so failures
    /// are logged and the tick is skipped.
    pub fn on_tick(&self, task_id: TaskId) {
        if let Err(e) = self.begin(task_id, ExecutionTrigger::Scheduled) {
            warn!(task_id, error = %e, "skipping tick");
        }
    }

    fn spawn_completion(&self, mut execution: TaskExecution, command: String) {
        let executions = Arc::clone(&self.executions);
        let executor = Arc::clone(&self.executor);

        // detached: the execution row is the only record of how it ended
        self.runtime.spawn(async move {
            let result = executor.run(&command, CancellationToken::new()).await;
            let outcome = outcome_of(result);

            // the only place an execution leaves Running
            execution.finish(outcome, Utc::now());
            debug!(
                execution_id = execution.id,
                status = %execution.status,
                "execution finished"
            );
            if let Err(e) = executions.update(&execution) {
                error!(
                    execution_id = execution.id,
                    error = %e,
                    "failed to update execution record"
                );
            }
        });
    }
}

/// Map an executor result onto the execution's terminal state.
pub fn outcome_of(result: std::result::Result<ExecResult, TerminalError>) -> ExecutionOutcome {
    match result {
        Ok(res) => match res.failure_message() {
            None => ExecutionOutcome::Success { output: res.output },
            Some(error) => ExecutionOutcome::Failed {
                output: res.output,
                error,
            },
        },
        Err(e) => ExecutionOutcome::Failed {
            output: String::new(),
            error: e.to_string(),
        },
    }
}
