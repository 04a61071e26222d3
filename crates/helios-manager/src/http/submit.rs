use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use helios_core::{safe_relative_path, AdmissionError, Priority, TaskDescriptor, TaskId, TaskStatus};

use crate::http::models::{TaskMetadata, TaskSubmissionResponse};
use crate::staging::{self, WorkingDir};
use crate::state::AppState;

/// `POST /api/v1/tasks/submit`: multipart form with a `file` part (the
/// project archive) and a `metadata` part (JSON). Builds the working
/// directory, enqueues the job, and responds, or rolls the working
/// directory back and responds with an error if staging or enqueueing
/// fails before anything else is committed.
pub async fn submit(State(state): State<AppState>, multipart: Multipart) -> Response {
    match handle(&state, multipart).await {
        Ok(task_id) => (
            StatusCode::OK,
            Json(TaskSubmissionResponse {
                success: true,
                task_id: task_id.to_string(),
                message: "Task submitted successfully.".to_string(),
            }),
        )
            .into_response(),
        Err(err) => {
            let status =
                StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (
                status,
                Json(TaskSubmissionResponse {
                    success: false,
                    task_id: String::new(),
                    message: err.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn handle(state: &AppState, mut multipart: Multipart) -> Result<TaskId, AdmissionError> {
    let mut archive_bytes: Option<Vec<u8>> = None;
    let mut metadata: Option<TaskMetadata> = None;

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| AdmissionError::BadMetadata(e.to_string()))?;
        let Some(field) = field else { break };
        match field.name() {
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AdmissionError::BadArchive(e.to_string()))?;
                archive_bytes = Some(bytes.to_vec());
            }
            Some("metadata") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AdmissionError::BadMetadata(e.to_string()))?;
                metadata = Some(
                    serde_json::from_str(&text)
                        .map_err(|e| AdmissionError::BadMetadata(e.to_string()))?,
                );
            }
            _ => {}
        }
    }

    let archive_bytes =
        archive_bytes.ok_or_else(|| AdmissionError::BadMetadata("missing file part".into()))?;
    let metadata =
        metadata.ok_or_else(|| AdmissionError::BadMetadata("missing metadata part".into()))?;

    let entrypoint = safe_relative_path(&metadata.entrypoint)?;
    let resources = metadata.resources.parse()?;

    let task_id = TaskId::new();
    let working_dir = WorkingDir::create(&state.storage_root, task_id).await?;

    if let Err(err) = extract_into(&working_dir, archive_bytes).await {
        working_dir.remove().await;
        return Err(err);
    }

    let descriptor = TaskDescriptor {
        id: task_id,
        working_dir: working_dir.path().to_path_buf(),
        entrypoint,
        priority: metadata.priority,
        name: metadata.name,
        resources,
    };

    if let Err(err) = state.status_store.set(task_id, TaskStatus::Pending).await {
        working_dir.remove().await;
        return Err(AdmissionError::BrokerUnavailable(err.to_string()));
    }

    if let Err(err) = enqueue(state, &descriptor).await {
        working_dir.remove().await;
        return Err(err);
    }

    slog::info!(state.log, "task submitted"; "task_id" => %task_id, "queue" => descriptor.priority.queue_name());
    Ok(task_id)
}

async fn extract_into(working_dir: &WorkingDir, bytes: Vec<u8>) -> Result<(), AdmissionError> {
    let dest = working_dir.path().to_path_buf();
    tokio::task::spawn_blocking(move || staging::extract_zip_into(&dest, bytes))
        .await
        .map_err(|e| AdmissionError::StorageFull(e.to_string()))?
}

async fn enqueue(state: &AppState, descriptor: &TaskDescriptor) -> Result<(), AdmissionError> {
    let queue_name = match descriptor.priority {
        Priority::High => helios_core::wire::QUEUE_HIGH,
        Priority::Default => helios_core::wire::QUEUE_DEFAULT,
    };
    state
        .queue
        .enqueue(queue_name, descriptor)
        .await
        .map_err(|e| AdmissionError::BrokerUnavailable(e.to_string()))
}
