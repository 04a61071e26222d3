pub mod logs_ws;
pub mod models;
pub mod status;
pub mod submit;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/v1/tasks/submit", post(submit::submit))
        .route("/api/v1/tasks/:task_id/status", get(status::get_status))
        .route("/ws/logs/:task_id", get(logs_ws::ws_logs))
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({"service": "helios-manager"}))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}
