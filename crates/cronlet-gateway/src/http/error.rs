use std::any::Any;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cronlet_scheduler::SchedulerError;
use serde_json::json;
use tracing::{error, warn};

/// Error returned by every handler; renders as `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError(pub SchedulerError);

pub type ApiResult<T> = Result<T, ApiError>;

impl From<SchedulerError> for ApiError {
    fn from(e: SchedulerError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SchedulerError::TaskNotFound { .. } | SchedulerError::ExecutionNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            SchedulerError::InvalidSchedule(_) | SchedulerError::InvalidTask(_) => {
                StatusCode::BAD_REQUEST
            }
            SchedulerError::Conflict(_) => StatusCode::CONFLICT,
            SchedulerError::Database(_)
            | SchedulerError::Persistence(_)
            | SchedulerError::TriggerNotFound { .. }
            | SchedulerError::Runtime(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.0.code(), error = %self.0, "request failed");
        } else {
            warn!(code = self.0.code(), error = %self.0, "request rejected");
        }
        (
            status,
            Json(json!({ "error": self.0.to_string(), "code": self.0.code() })),
        )
            .into_response()
    }
}

/// Response for a handler that panicked: logged, then a plain 500.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = detail, "handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal server error", "code": "INTERNAL_ERROR" })),
    )
        .into_response()
}
