use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::instrument;

use crate::error::{Result, SchedulerError};
use crate::store::{parse_time, text_error};
use crate::types::{ExecutionId, ExecutionStatus, NewExecution, TaskExecution, TaskId};

/// Audit log of command invocations.
///
/// Implementations must tolerate concurrent `create`/`update` calls from many
/// in-flight executions.
pub trait ExecutionRecorder: Send + Sync {
    /// Insert a `Running` row and return it with its assigned id.
    fn create(&self, new: NewExecution) -> Result<TaskExecution>;

    /// Write the terminal state of `execution`, keyed by its id.
    fn update(&self, execution: &TaskExecution) -> Result<()>;

    /// `ExecutionNotFound` if no such row.
    fn get_by_id(&self, id: ExecutionId) -> Result<TaskExecution>;

    /// Most recent executions of a task, newest first.
    fn list_for_task(&self, task_id: TaskId, limit: usize) -> Result<Vec<TaskExecution>>;
}

const EXECUTION_COLUMNS: &str =
    "id, task_id, triggered_by, start_time, end_time, status, output, error";

/// SQLite-backed [`ExecutionRecorder`].
pub struct SqliteExecutionRecorder {
    db: Arc<Mutex<Connection>>,
}

impl SqliteExecutionRecorder {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self::with_shared(Arc::new(Mutex::new(conn)))
    }

    pub fn with_shared(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| SchedulerError::Persistence("execution recorder lock poisoned".into()))
    }
}

impl ExecutionRecorder for SqliteExecutionRecorder {
    #[instrument(skip(self, new), fields(task_id = new.task_id, trigger = %new.trigger))]
    fn create(&self, new: NewExecution) -> Result<TaskExecution> {
        let db = self.conn()?;
        db.execute(
            "INSERT INTO task_executions (task_id, triggered_by, start_time, status)
             VALUES (?1, ?2, ?3, 'running')",
            rusqlite::params![
                new.task_id,
                new.trigger.to_string(),
                new.start_time.to_rfc3339()
            ],
        )?;
        Ok(TaskExecution {
            id: db.last_insert_rowid(),
            task_id: new.task_id,
            trigger: new.trigger,
            start_time: new.start_time,
            end_time: None,
            status: ExecutionStatus::Running,
            output: String::new(),
            error: String::new(),
        })
    }

    #[instrument(skip(self, execution), fields(execution_id = execution.id, status = %execution.status))]
    fn update(&self, execution: &TaskExecution) -> Result<()> {
        let db = self.conn()?;
        let n = db.execute(
            "UPDATE task_executions
             SET end_time = ?1, status = ?2, output = ?3, error = ?4
             WHERE id = ?5",
            rusqlite::params![
                execution.end_time.map(|t| t.to_rfc3339()),
                execution.status.to_string(),
                execution.output,
                execution.error,
                execution.id
            ],
        )?;
        if n == 0 {
            return Err(SchedulerError::ExecutionNotFound { id: execution.id });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    fn get_by_id(&self, id: ExecutionId) -> Result<TaskExecution> {
        let db = self.conn()?;
        match db.query_row(
            &format!("SELECT {EXECUTION_COLUMNS} FROM task_executions WHERE id = ?1"),
            [id],
            row_to_execution,
        ) {
            Ok(e) => Ok(e),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                Err(SchedulerError::ExecutionNotFound { id })
            }
            Err(e) => Err(SchedulerError::Database(e)),
        }
    }

    #[instrument(skip(self))]
    fn list_for_task(&self, task_id: TaskId, limit: usize) -> Result<Vec<TaskExecution>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM task_executions
             WHERE task_id = ?1 ORDER BY id DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(rusqlite::params![task_id, limit as i64], row_to_execution)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

/// Map a SQLite row to a `TaskExecution`.
fn row_to_execution(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskExecution> {
    let trigger: String = row.get(2)?;
    let status: String = row.get(5)?;
    let end_time = match row.get::<_, Option<String>>(4)? {
        Some(_) => Some(parse_time(row, 4)?),
        None => None,
    };
    Ok(TaskExecution {
        id: row.get(0)?,
        task_id: row.get(1)?,
        trigger: trigger.parse().map_err(|e: String| text_error(2, e))?,
        start_time: parse_time(row, 3)?,
        end_time,
        status: status.parse().map_err(|e: String| text_error(5, e))?,
        output: row.get(6)?,
        error: row.get(7)?,
    })
}
