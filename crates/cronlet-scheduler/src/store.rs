use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode};
use tracing::{debug, info, instrument};

use crate::error::{Result, SchedulerError};
use crate::schedule::parse_cron;
use crate::types::{NewTask, Task, TaskId};

/// Task definitions as seen by the scheduler.
pub trait TaskStore: Send + Sync {
    /// Every live task with `enabled = true`, ordered by id.
    fn list_all_enabled(&self) -> Result<Vec<Task>>;

    /// Fetch one live task. `TaskNotFound` if absent or soft-deleted.
    fn get_by_id(&self, id: TaskId) -> Result<Task>;

    /// Persist every mutable field of `task`, keyed by `task.id`.
    fn update(&self, task: &Task) -> Result<()>;
}

const TASK_COLUMNS: &str = "id, name, description, cron_expr, command, enabled, status,
                            created_at, updated_at";

/// SQLite-backed [`TaskStore`] with the definition operations used by the API.
///
/// Wraps a single connection in a `Mutex`; rows are never hard-deleted.
pub struct SqliteTaskStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteTaskStore {
    /// Wrap an already-open (and `init_db`-initialised) connection.
    pub fn new(conn: Connection) -> Self {
        Self::with_shared(Arc::new(Mutex::new(conn)))
    }

    /// Share a connection with other stores (used with in-memory databases).
    pub fn with_shared(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| SchedulerError::Persistence("task store lock poisoned".into()))
    }

    /// Define a new task. Validates the cron expression up front.
    #[instrument(skip(self, new), fields(name = %new.name))]
    pub fn create(&self, new: &NewTask) -> Result<Task> {
        validate(new)?;
        let now = Utc::now().to_rfc3339();
        let db = self.conn()?;
        db.execute(
            "INSERT INTO tasks
             (name, description, cron_expr, command, enabled, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'stopped', ?6, ?6)",
            rusqlite::params![
                new.name,
                new.description,
                new.cron_expr,
                new.command,
                new.enabled,
                now
            ],
        )
        .map_err(|e| name_conflict(e, &new.name))?;
        let id = db.last_insert_rowid();
        info!(task_id = id, "task created");
        get_task(&db, id)
    }

    /// All live tasks, ordered by id.
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<Task>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE deleted_at IS NULL ORDER BY id"
        ))?;
        let rows = stmt.query_map([], row_to_task)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Replace a task's definition fields, keeping its status.
    #[instrument(skip(self, def))]
    pub fn update_definition(&self, id: TaskId, def: &NewTask) -> Result<Task> {
        validate(def)?;
        let now = Utc::now().to_rfc3339();
        let db = self.conn()?;
        let n = db
            .execute(
                "UPDATE tasks
                 SET name = ?1, description = ?2, cron_expr = ?3, command = ?4,
                     enabled = ?5, updated_at = ?6
                 WHERE id = ?7 AND deleted_at IS NULL",
                rusqlite::params![
                    def.name,
                    def.description,
                    def.cron_expr,
                    def.command,
                    def.enabled,
                    now,
                    id
                ],
            )
            .map_err(|e| name_conflict(e, &def.name))?;
        if n == 0 {
            return Err(SchedulerError::TaskNotFound { id });
        }
        get_task(&db, id)
    }

    /// Mark a task deleted. Its executions are kept.
    #[instrument(skip(self))]
    pub fn soft_delete(&self, id: TaskId) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let db = self.conn()?;
        let n = db.execute(
            "UPDATE tasks SET deleted_at = ?1, enabled = 0, status = 'stopped', updated_at = ?1
             WHERE id = ?2 AND deleted_at IS NULL",
            rusqlite::params![now, id],
        )?;
        if n == 0 {
            return Err(SchedulerError::TaskNotFound { id });
        }
        info!(task_id = id, "task deleted");
        Ok(())
    }
}

impl TaskStore for SqliteTaskStore {
    #[instrument(skip(self))]
    fn list_all_enabled(&self) -> Result<Vec<Task>> {
        let db = self.conn()?;
        let mut stmt = db.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE enabled = 1 AND deleted_at IS NULL ORDER BY id"
        ))?;
        let rows = stmt.query_map([], row_to_task)?;
        let tasks = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        debug!(count = tasks.len(), "listed enabled tasks");
        Ok(tasks)
    }

    #[instrument(skip(self))]
    fn get_by_id(&self, id: TaskId) -> Result<Task> {
        let db = self.conn()?;
        get_task(&db, id)
    }

    #[instrument(skip(self, task), fields(task_id = task.id, status = %task.status))]
    fn update(&self, task: &Task) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let db = self.conn()?;
        let n = db
            .execute(
                "UPDATE tasks
                 SET name = ?1, description = ?2, cron_expr = ?3, command = ?4,
                     enabled = ?5, status = ?6, updated_at = ?7
                 WHERE id = ?8 AND deleted_at IS NULL",
                rusqlite::params![
                    task.name,
                    task.description,
                    task.cron_expr,
                    task.command,
                    task.enabled,
                    task.status.to_string(),
                    now,
                    task.id
                ],
            )
            .map_err(|e| name_conflict(e, &task.name))?;
        if n == 0 {
            return Err(SchedulerError::TaskNotFound { id: task.id });
        }
        Ok(())
    }
}

fn get_task(db: &Connection, id: TaskId) -> Result<Task> {
    match db.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 AND deleted_at IS NULL"),
        [id],
        row_to_task,
    ) {
        Ok(t) => Ok(t),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(SchedulerError::TaskNotFound { id }),
        Err(e) => Err(SchedulerError::Database(e)),
    }
}

fn validate(def: &NewTask) -> Result<()> {
    if def.name.trim().is_empty() {
        return Err(SchedulerError::InvalidTask("name must not be empty".into()));
    }
    if def.command.trim().is_empty() {
        return Err(SchedulerError::InvalidTask("command must not be empty".into()));
    }
    parse_cron(&def.cron_expr)?;
    Ok(())
}

fn name_conflict(e: rusqlite::Error, name: &str) -> SchedulerError {
    match e.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => {
            SchedulerError::Conflict(format!("task name already in use: {name}"))
        }
        _ => SchedulerError::Database(e),
    }
}

/// Map a SQLite row to a `Task`.
fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let status: String = row.get(6)?;
    Ok(Task {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        cron_expr: row.get(3)?,
        command: row.get(4)?,
        enabled: row.get(5)?,
        status: status.parse().map_err(|e: String| text_error(6, e))?,
        created_at: parse_time(row, 7)?,
        updated_at: parse_time(row, 8)?,
    })
}

pub(crate) fn parse_time(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| text_error(idx, e.to_string()))
}

pub(crate) fn text_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        Box::<dyn std::error::Error + Send + Sync>::from(msg),
    )
}
