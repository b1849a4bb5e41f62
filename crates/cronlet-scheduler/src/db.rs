use rusqlite::Connection;

use crate::error::Result;

/// Initialise the scheduler schema in `conn`.
///
/// Creates `tasks` and `task_executions` (idempotent). Task names are unique
/// among live rows only, so a soft-deleted task's name can be reused.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tasks (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT    NOT NULL,
            description TEXT    NOT NULL DEFAULT '',
            cron_expr   TEXT    NOT NULL,
            command     TEXT    NOT NULL,
            enabled     INTEGER NOT NULL DEFAULT 1,
            status      TEXT    NOT NULL DEFAULT 'stopped',
            created_at  TEXT    NOT NULL,
            updated_at  TEXT    NOT NULL,
            deleted_at  TEXT                -- soft delete marker
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_live_name
            ON tasks (name) WHERE deleted_at IS NULL;

        CREATE TABLE IF NOT EXISTS task_executions (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id      INTEGER NOT NULL REFERENCES tasks (id),
            triggered_by TEXT    NOT NULL DEFAULT 'scheduled',
            start_time   TEXT    NOT NULL,
            end_time     TEXT,               -- NULL while running
            status       TEXT    NOT NULL DEFAULT 'running',
            output       TEXT    NOT NULL DEFAULT '',
            error        TEXT    NOT NULL DEFAULT ''
        );

        CREATE INDEX IF NOT EXISTS idx_task_executions_task
            ON task_executions (task_id, id DESC);
        ",
    )?;
    Ok(())
}
