//! Task definition CRUD plus the lifecycle endpoints that drive the scheduler.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use cronlet_scheduler::schedule::next_fire;
use cronlet_scheduler::{NewTask, Task, TaskId, TaskStatus, TaskStore};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use super::error::ApiResult;
use crate::app::AppState;

/// A task plus its next tick, reported only while it is scheduled.
#[derive(Debug, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,
    pub next_fire: Option<DateTime<Utc>>,
}

/// GET /tasks
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Task>>> {
    Ok(Json(state.tasks.list()?))
}

/// POST /tasks: new tasks start out stopped.
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(def): Json<NewTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    let task = state.tasks.create(&def)?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /tasks/{id}
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TaskId>,
) -> ApiResult<Json<TaskView>> {
    let task = state.tasks.get_by_id(id)?;
    let next_fire = if state.scheduler.is_scheduled(id) {
        next_fire(&task.cron_expr)?
    } else {
        None
    };
    Ok(Json(TaskView { task, next_fire }))
}

/// PUT /tasks/{id}
///
/// A running task picks up the new definition immediately: it is restarted,
/// or stopped if the update disabled it.
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TaskId>,
    Json(def): Json<NewTask>,
) -> ApiResult<Json<Task>> {
    let mut task = state.tasks.update_definition(id, &def)?;
    if task.status == TaskStatus::Running || state.scheduler.is_scheduled(id) {
        if task.enabled {
            state.scheduler.start_task(&mut task)?;
            info!(task_id = id, "task restarted with new definition");
        } else {
            state.scheduler.stop_task_by_id(id)?;
            task = state.tasks.get_by_id(id)?;
        }
    }
    Ok(Json(task))
}

/// DELETE /tasks/{id}: stop, then soft-delete. Execution history is kept.
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TaskId>,
) -> ApiResult<StatusCode> {
    state.scheduler.stop_task_by_id(id)?;
    state.tasks.soft_delete(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /tasks/{id}/start
pub async fn start_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TaskId>,
) -> ApiResult<Json<Task>> {
    let mut task = state.tasks.get_by_id(id)?;
    state.scheduler.start_task(&mut task)?;
    Ok(Json(task))
}

/// POST /tasks/{id}/stop
pub async fn stop_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TaskId>,
) -> ApiResult<Json<Task>> {
    state.scheduler.stop_task_by_id(id)?;
    Ok(Json(state.tasks.get_by_id(id)?))
}

/// POST /tasks/{id}/run: returns as soon as the execution row exists.
pub async fn run_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TaskId>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let execution_id = state.scheduler.execute_task_now(id)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "execution_id": execution_id })),
    ))
}
