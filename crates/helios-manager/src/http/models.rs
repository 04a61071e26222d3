use helios_core::{Priority, RawResources};
use serde::{Deserialize, Serialize};

/// The JSON object accompanying the uploaded archive in the `metadata`
/// multipart field. Unrecognized fields are ignored rather than
/// rejected; required fields are enforced by being non-`Option`, plus
/// the explicit path/resource validation pass done by the submit
/// handler.
#[derive(Debug, Deserialize)]
pub struct TaskMetadata {
    pub entrypoint: String,
    pub name: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub resources: RawResources,
}

#[derive(Debug, Serialize)]
pub struct TaskSubmissionResponse {
    pub success: bool,
    pub task_id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TaskStatusResponse {
    pub task_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub detail: String,
}
