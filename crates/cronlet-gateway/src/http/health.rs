use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness check with build info and the live trigger count.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "commit": env!("CRONLET_GIT_SHA"),
        "scheduled": state.scheduler.registry().len(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::app::test_support::{router, send, state};

    #[tokio::test]
    async fn reports_ok_and_scheduled_count() {
        let state = state();
        let (status, body) = send(&router(&state), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["scheduled"], 0);
    }
}
