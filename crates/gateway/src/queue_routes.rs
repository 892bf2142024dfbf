use {
    axum::{
        extract::{Path, State},
        response::Json,
    },
    relay_dispatch::{StatusCounts, Task},
    serde::Serialize,
};

use crate::{error::ApiError, server::AppState};

#[derive(Debug, Serialize)]
pub struct QueueStatusResponse {
    pub queue_size: usize,
    pub total_tasks: usize,
    pub counts: StatusCounts,
    /// Keyed by task id.
    pub tasks: serde_json::Map<String, serde_json::Value>,
}

pub async fn task_status_handler(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(state.gateway.engine.task(&task_id)?))
}

pub async fn queue_status_handler(
    State(state): State<AppState>,
) -> Result<Json<QueueStatusResponse>, ApiError> {
    let status = state.gateway.engine.queue_status();
    let mut tasks = serde_json::Map::with_capacity(status.tasks.len());
    for task in status.tasks {
        let id = task.id.to_string();
        tasks.insert(id, serde_json::to_value(task).map_err(ApiError::internal)?);
    }
    Ok(Json(QueueStatusResponse {
        queue_size: status.queue_size,
        total_tasks: status.total_tasks,
        counts: status.counts,
        tasks,
    }))
}
