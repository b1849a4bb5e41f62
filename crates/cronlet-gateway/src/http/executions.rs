use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use cronlet_scheduler::{ExecutionId, ExecutionRecorder, TaskExecution, TaskId, TaskStore};
use serde::Deserialize;

use super::error::ApiResult;
use crate::app::AppState;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

/// GET /tasks/{id}/executions?limit=N, newest first.
pub async fn list_for_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<TaskId>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<TaskExecution>>> {
    // 404 for unknown tasks rather than an empty list
    state.tasks.get_by_id(task_id)?;
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    Ok(Json(state.executions.list_for_task(task_id, limit)?))
}

/// GET /executions/{id}
pub async fn get_execution(
    State(state): State<Arc<AppState>>,
    Path(id): Path<ExecutionId>,
) -> ApiResult<Json<TaskExecution>> {
    Ok(Json(state.executions.get_by_id(id)?))
}
