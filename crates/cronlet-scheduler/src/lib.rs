//! `cronlet-scheduler`: binds persisted command tasks to cron triggers and
//! records every run.
//!
//! # Overview
//!
//! Task definitions live in a SQLite `tasks` table ([`store`]). The
//! [`engine::Scheduler`] starts a trigger for each enabled task through a
//! [`timer::TimerEngine`] and tracks it in the [`registry::JobRegistry`]. On
//! every tick, or on an explicit "run now", the [`runner`] records a
//! `Running` execution, runs the command in a spawned task and writes the
//! terminal state back through the [`recorder`].
//!
//! # State machines
//!
//! | Record          | Transitions                                   |
//! |-----------------|-----------------------------------------------|
//! | `Task`          | `Stopped ⇄ Running` (start / stop)            |
//! | `TaskExecution` | `Running → Success` or `Running → Failed`     |

pub mod db;
pub mod engine;
pub mod error;
pub mod recorder;
pub mod registry;
pub mod runner;
pub mod schedule;
pub mod store;
pub mod timer;
pub mod types;

pub use engine::{LoadReport, Scheduler};
pub use error::{Result, SchedulerError};
pub use recorder::{ExecutionRecorder, SqliteExecutionRecorder};
pub use registry::JobRegistry;
pub use store::{SqliteTaskStore, TaskStore};
pub use timer::{CronTimerEngine, TickCallback, TimerEngine, TriggerHandle};
pub use types::{
    ExecutionId, ExecutionOutcome, ExecutionStatus, ExecutionTrigger, NewExecution, NewTask, Task,
    TaskExecution, TaskId, TaskStatus,
};
