use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Primary key of a task row.
pub type TaskId = i64;
/// Primary key of a task execution row.
pub type ExecutionId = i64;

/// Whether a task is currently bound to a live trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Stopped,
    Running,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Stopped => "stopped",
            TaskStatus::Running => "running",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "stopped" => Ok(TaskStatus::Stopped),
            "running" => Ok(TaskStatus::Running),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// Lifecycle state of a single command invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// The command has been started and has not finished yet.
    Running,
    /// The command exited with status 0.
    Success,
    /// The command could not be launched, exited non-zero, timed out or was
    /// cancelled.
    Failed,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "running" => Ok(ExecutionStatus::Running),
            "success" => Ok(ExecutionStatus::Success),
            "failed" => Ok(ExecutionStatus::Failed),
            other => Err(format!("unknown execution status: {other}")),
        }
    }
}

/// Which entry point created an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionTrigger {
    /// A timer engine tick.
    Scheduled,
    /// An explicit "run now" request.
    Manual,
}

impl std::fmt::Display for ExecutionTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionTrigger::Scheduled => "scheduled",
            ExecutionTrigger::Manual => "manual",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ExecutionTrigger {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(ExecutionTrigger::Scheduled),
            "manual" => Ok(ExecutionTrigger::Manual),
            other => Err(format!("unknown execution trigger: {other}")),
        }
    }
}

/// A persisted job definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Unique among live tasks.
    pub name: String,
    pub description: String,
    /// Cron expression; 5-field (minute first) or 6/7-field (seconds first).
    pub cron_expr: String,
    /// Shell command run on every tick.
    pub command: String,
    /// Enabled tasks are started when the scheduler loads.
    pub enabled: bool,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when defining a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub cron_expr: String,
    pub command: String,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

fn enabled_default() -> bool {
    true
}

impl NewTask {
    pub fn new(name: impl Into<String>, cron_expr: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            cron_expr: cron_expr.into(),
            command: command.into(),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// One audit record of a single invocation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskExecution {
    pub id: ExecutionId,
    pub task_id: TaskId,
    pub trigger: ExecutionTrigger,
    pub start_time: DateTime<Utc>,
    /// `None` exactly while `status` is `Running`.
    pub end_time: Option<DateTime<Utc>>,
    pub status: ExecutionStatus,
    pub output: String,
    /// Empty unless `status` is `Failed`.
    pub error: String,
}

/// How a finished command turned out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Success { output: String },
    Failed { output: String, error: String },
}

impl TaskExecution {
    /// Move a running execution to its terminal state.
    ///
    /// Returns `false` and leaves the record untouched if it already finished.
    pub fn finish(&mut self, outcome: ExecutionOutcome, at: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match outcome {
            ExecutionOutcome::Success { output } => {
                self.status = ExecutionStatus::Success;
                self.output = output;
                self.error.clear();
            }
            ExecutionOutcome::Failed { output, error } => {
                self.status = ExecutionStatus::Failed;
                self.output = output;
                self.error = error;
            }
        }
        self.end_time = Some(at);
        true
    }
}

/// Fields supplied when recording the start of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExecution {
    pub task_id: TaskId,
    pub trigger: ExecutionTrigger,
    pub start_time: DateTime<Utc>,
}

impl NewExecution {
    pub fn starting_now(task_id: TaskId, trigger: ExecutionTrigger) -> Self {
        Self {
            task_id,
            trigger,
            start_time: Utc::now(),
        }
    }
}
