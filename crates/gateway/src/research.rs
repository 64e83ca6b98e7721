//! Research task API.
//!
//! Endpoints:
//!
//! - `GET    /`                     - Service info and endpoint map
//! - `POST   /research`             - Submit a research request
//! - `GET    /research`             - List tasks, newest first
//! - `GET    /research/{id}/status` - Status and progress of one task
//! - `GET    /research/{id}`        - Full result of one task
//! - `DELETE /research/{id}`        - Cancel a queued task
//! - `GET    /health`               - Liveness plus task counts

use axum::{
    Router,
    extract::rejection::JsonRejection,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
};
use chrono::{DateTime, Utc};
use delve_core::error::TaskError;
use delve_core::task::{ResearchRequest, TaskRecord, TaskStatus};
use delve_tasks::TaskManager;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Characters of a query shown in task listings.
const QUERY_PREVIEW_CHARS: usize = 100;

// ── State ─────────────────────────────────────────────────────────────────

pub struct GatewayState {
    pub tasks: Arc<TaskManager>,
}

pub type SharedState = Arc<GatewayState>;

pub fn research_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/research", get(list_handler).post(submit_handler))
        .route("/research/{id}", get(result_handler).delete(cancel_handler))
        .route("/research/{id}/status", get(status_handler))
        .with_state(state)
}

// ── DTOs ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub message: String,
    pub version: String,
    pub framework: String,
    pub endpoints: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub active_tasks: usize,
    pub total_tasks: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub message: String,
    pub estimated_time: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub query: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: u8,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResultResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub files_generated: Vec<String>,
    pub truncated: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task_id: String,
    pub status: TaskStatus,
    pub query: String,
    pub created_at: DateTime<Utc>,
    pub progress: u8,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskListResponse {
    pub total_tasks: usize,
    pub tasks: Vec<TaskSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn task_error(err: TaskError) -> ApiError {
    let status = match &err {
        TaskError::NotFound(_) => StatusCode::NOT_FOUND,
        TaskError::NotCancellable { .. } => StatusCode::BAD_REQUEST,
        TaskError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
        TaskError::QueueFull { .. } | TaskError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        TaskError::Cancelled | TaskError::Execution(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error(status, err.to_string())
}

impl From<&TaskRecord> for StatusResponse {
    fn from(record: &TaskRecord) -> Self {
        Self {
            task_id: record.task_id.clone(),
            status: record.status,
            query: record.query.clone(),
            created_at: record.created_at,
            completed_at: record.completed_at,
            progress: record.progress,
        }
    }
}

impl From<TaskRecord> for ResultResponse {
    fn from(record: TaskRecord) -> Self {
        Self {
            task_id: record.task_id,
            status: record.status,
            query: record.query,
            result: record.result,
            error: record.error,
            created_at: record.created_at,
            completed_at: record.completed_at,
            files_generated: record.files_generated,
            truncated: record.truncated,
        }
    }
}

impl From<&TaskRecord> for TaskSummary {
    fn from(record: &TaskRecord) -> Self {
        Self {
            task_id: record.task_id.clone(),
            status: record.status,
            query: preview(&record.query),
            created_at: record.created_at,
            progress: record.progress,
        }
    }
}

fn preview(query: &str) -> String {
    match query.char_indices().nth(QUERY_PREVIEW_CHARS) {
        Some((idx, _)) => format!("{}...", &query[..idx]),
        None => query.to_string(),
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn root_handler() -> Json<ServiceInfo> {
    let endpoints = [
        ("research", "/research"),
        ("status", "/research/{task_id}/status"),
        ("results", "/research/{task_id}"),
        ("list", "/research"),
        ("cancel", "/research/{task_id}"),
        ("health", "/health"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    Json(ServiceInfo {
        message: "Delve Research Agent API".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        framework: "axum with a background worker pool".into(),
        endpoints,
    })
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    let counts = state.tasks.counts().await;
    Json(HealthResponse {
        status: "healthy".into(),
        timestamp: Utc::now(),
        active_tasks: counts.active,
        total_tasks: counts.total,
    })
}

async fn submit_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ResearchRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    if state.tasks.is_shutting_down() {
        return Err(task_error(TaskError::ShuttingDown));
    }
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Rejected research request body");
        let status = match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        error(status, rejection.body_text())
    })?;

    let record = state.tasks.submit(request).await.map_err(task_error)?;
    info!(task_id = %record.task_id, "Research request accepted");

    Ok(Json(SubmitResponse {
        task_id: record.task_id,
        status: record.status,
        message: "Research request submitted successfully".into(),
        estimated_time: "30-120 seconds".into(),
    }))
}

async fn status_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let record = state.tasks.status(&id).await.map_err(task_error)?;
    Ok(Json(StatusResponse::from(&record)))
}

async fn result_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ResultResponse>, ApiError> {
    let record = state.tasks.result(&id).await.map_err(task_error)?;
    Ok(Json(ResultResponse::from(record)))
}

async fn list_handler(State(state): State<SharedState>) -> Json<TaskListResponse> {
    let tasks: Vec<TaskSummary> = state.tasks.list().await.iter().map(TaskSummary::from).collect();
    Json(TaskListResponse {
        total_tasks: tasks.len(),
        tasks,
    })
}

async fn cancel_handler(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.tasks.cancel(&id).await.map_err(task_error)?;
    Ok(Json(MessageResponse {
        message: "Task cancelled successfully".into(),
    }))
}

// ── Tests ─────────────────────────────────────────────────────────────────
