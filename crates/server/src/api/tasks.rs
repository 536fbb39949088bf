//! Task endpoints: creation, polling and print requests.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use kiosk_core::{PrintItem, Task, TaskInput, TaskType};

use super::error::{ApiError, ApiResponse};
use super::middleware::{ActivityTenant, AuthUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    /// Photo reference (URL or base64 data).
    #[serde(alias = "url")]
    pub image: String,
}

/// Parse a task type path segment (`styled_image`, `VIDEO_EFFECT`, ...).
pub(crate) fn parse_task_type(raw: &str) -> Result<TaskType, ApiError> {
    raw.parse::<TaskType>().map_err(ApiError::invalid)
}

pub async fn create_task(
    State(state): State<Arc<AppState>>,
    ActivityTenant(tenant): ActivityTenant,
    Path(task_type): Path<String>,
    Json(body): Json<CreateTaskRequest>,
) -> Result<ApiResponse<Task>, ApiError> {
    let task_type = parse_task_type(&task_type)?;
    let task = state
        .kiosk()
        .orchestrator(&tenant)
        .create_task(task_type, TaskInput { image: body.image })
        .await?;
    Ok(ApiResponse(task))
}

pub async fn query_task(
    State(state): State<Arc<AppState>>,
    ActivityTenant(tenant): ActivityTenant,
    Path((task_type, name)): Path<(String, String)>,
) -> Result<ApiResponse<Task>, ApiError> {
    let task_type = parse_task_type(&task_type)?;
    let task = state
        .kiosk()
        .orchestrator(&tenant)
        .query_task(task_type, &name)
        .await?;
    Ok(ApiResponse(task))
}

/// Visitor print request; a task prints at most once.
pub async fn print_task(
    State(state): State<Arc<AppState>>,
    ActivityTenant(tenant): ActivityTenant,
    Path((task_type, name)): Path<(String, String)>,
) -> Result<ApiResponse<PrintItem>, ApiError> {
    let task_type = parse_task_type(&task_type)?;
    let item = state
        .kiosk()
        .orchestrator(&tenant)
        .print_task(task_type, &name, false)?;
    Ok(ApiResponse(item))
}

/// Operator reprint from the console; duplicates are allowed.
pub async fn print_from_console(
    State(state): State<Arc<AppState>>,
    ActivityTenant(tenant): ActivityTenant,
    AuthUser(user): AuthUser,
    Path((task_type, name)): Path<(String, String)>,
) -> Result<ApiResponse<PrintItem>, ApiError> {
    let task_type = parse_task_type(&task_type)?;
    let item = state
        .kiosk()
        .orchestrator(&tenant)
        .print_task(task_type, &name, true)?;
    info!(tenant = %tenant, task = %name, user = %user, "Console print requested");
    Ok(ApiResponse(item))
}
