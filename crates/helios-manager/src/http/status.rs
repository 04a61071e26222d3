use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use helios_core::TaskId;

use crate::http::models::{ErrorResponse, TaskStatusResponse};
use crate::state::AppState;

/// `GET /api/v1/tasks/{task_id}/status`.
pub async fn get_status(State(state): State<AppState>, Path(task_id): Path<String>) -> Response {
    let Ok(task_id) = task_id.parse::<TaskId>() else {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                detail: "task not found".into(),
            }),
        )
            .into_response();
    };

    match state.status_store.get(task_id).await {
        Ok(Some(status)) => (
            StatusCode::OK,
            Json(TaskStatusResponse {
                task_id: task_id.to_string(),
                status: status.as_wire_str().to_string(),
            }),
        )
            .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                detail: "task not found".into(),
            }),
        )
            .into_response(),
        Err(err) => {
            slog::error!(state.log, "status lookup failed"; "task_id" => %task_id, "error" => %err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    detail: "status store unavailable".into(),
                }),
            )
                .into_response()
        }
    }
}
