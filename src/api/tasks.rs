//! Task submission and inspection handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AppError, Result};
use crate::queue::task::{TaskPayload, TaskStatus, TaskType};
use crate::queue::task_queue::{NewTask, TaskFilter};
use crate::AppState;

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 500;

/// Body of `POST /api/v1/tasks/{task_type}/{resource_id}`.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub project: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(flatten)]
    pub payload: TaskPayload,
}

#[derive(Debug, Serialize)]
pub struct CreateTaskResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub deduped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_task_id: Option<String>,
}

pub async fn create_task(
    State(state): State<AppState>,
    Path((task_type, resource_id)): Path<(String, String)>,
    Json(request): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse> {
    let task_type: TaskType = task_type
        .parse()
        .map_err(AppError::InvalidRequest)?;
    if request.project.trim().is_empty() {
        return Err(AppError::InvalidRequest("project is required".to_string()));
    }
    if request.payload.prompt.trim().is_empty() {
        return Err(AppError::InvalidRequest("prompt is required".to_string()));
    }

    let outcome = state.queue.enqueue(NewTask {
        project: request.project,
        task_type,
        resource_id,
        source: request.source.unwrap_or_else(|| "webui".to_string()),
        payload: request.payload,
    });

    let response = CreateTaskResponse {
        task_id: outcome.task.id.clone(),
        status: outcome.task.status,
        deduped: outcome.deduped,
        existing_task_id: outcome.deduped.then(|| outcome.task.id.clone()),
    };
    let code = if outcome.deduped {
        StatusCode::OK
    } else {
        StatusCode::ACCEPTED
    };
    Ok((code, Json(response)))
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let task = state
        .queue
        .get(&task_id)
        .ok_or(AppError::TaskNotFound(task_id))?;
    Ok(Json(json!({ "task": task })))
}

/// Query string of `GET /api/v1/tasks`.
#[derive(Debug, Default, Deserialize)]
pub struct ListTasksQuery {
    pub project: Option<String>,
    pub status: Option<String>,
    pub task_type: Option<String>,
    pub source: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<crate::queue::task_queue::TaskPage>> {
    let page = query.page.unwrap_or(1);
    if page < 1 {
        return Err(AppError::InvalidRequest("page must be at least 1".to_string()));
    }
    let page_size = query.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
    if page_size < 1 || page_size > MAX_PAGE_SIZE {
        return Err(AppError::InvalidRequest(format!(
            "page_size must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }

    let filter = TaskFilter {
        project: query.project,
        status: query
            .status
            .map(|s| s.parse::<TaskStatus>())
            .transpose()
            .map_err(AppError::InvalidRequest)?,
        task_type: query
            .task_type
            .map(|s| s.parse::<TaskType>())
            .transpose()
            .map_err(AppError::InvalidRequest)?,
        source: query.source,
    };

    Ok(Json(state.queue.list(&filter, page, page_size)))
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub project: Option<String>,
}

pub async fn task_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Json<serde_json::Value> {
    let stats = state.queue.stats(query.project.as_deref());
    Json(json!({ "stats": stats }))
}
