use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use cronlet_scheduler::{Scheduler, SqliteExecutionRecorder, SqliteTaskStore};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::http::{error::panic_response, executions, health, tasks};

/// Shared state handed to every Axum handler as `Arc<AppState>`.
pub struct AppState {
    /// Definition CRUD goes straight to the store; lifecycle goes through
    /// `scheduler`, which holds a second reference to the same store.
    pub tasks: Arc<SqliteTaskStore>,
    pub executions: Arc<SqliteExecutionRecorder>,
    pub scheduler: Scheduler,
}

impl AppState {
    pub fn new(
        tasks: Arc<SqliteTaskStore>,
        executions: Arc<SqliteExecutionRecorder>,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            tasks,
            executions,
            scheduler,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route("/health", get(health::health_handler))
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/tasks/{id}",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/tasks/{id}/start", post(tasks::start_task))
        .route("/tasks/{id}/stop", post(tasks::stop_task))
        .route("/tasks/{id}/run", post(tasks::run_task))
        .route("/tasks/{id}/executions", get(executions::list_for_task))
        .route("/executions/{id}", get(executions::get_execution))
        .with_state(state);
    with_middleware(router)
}

/// Layers every route runs behind: request tracing, and panics turned into 500s.
fn with_middleware(router: Router) -> Router {
    router
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
}


#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, routing::get, Router};

    use super::test_support::send;
    use super::with_middleware;

    async fn blow_up() -> &'static str {
        panic!("handler blew up")
    }

    #[tokio::test]
    async fn handler_panic_becomes_500() {
        let app = with_middleware(Router::new().route("/boom", get(blow_up)));
        let (status, body) = send(&app, "GET", "/boom", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal server error");

        // the service survives and keeps answering
        let (status, _) = send(&app, "GET", "/boom", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
