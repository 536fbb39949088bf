//! Print queue endpoints used by the printer station and the console.
//!
//! All routes serve the stylized-image queue, the only printable type.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use kiosk_core::printing::apply_printer_event;
use kiosk_core::{KioskError, PrintItem, PrintQueue, PrinterEvent, PrintingStatus, Tenant, TaskType};

use super::error::{ApiError, ApiResponse};
use super::middleware::ActivityTenant;
use crate::state::AppState;

/// Upper bound on items handed out by one batch fetch.
const MAX_BATCH_FETCH: usize = 50;

fn queue(state: &AppState, tenant: &Tenant) -> PrintQueue {
    state.kiosk().print_queue(tenant, TaskType::StyledImage)
}

#[derive(Debug, Deserialize)]
pub struct BatchFetchRequest {
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct QueryAllParams {
    pub keyword: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JobCountRequest {
    pub count: i64,
}

#[derive(Debug, Deserialize)]
pub struct PrinterCallbackRequest {
    pub job_name: String,
    pub event: PrinterEvent,
}

/// Next admitted item, or `null` when nothing may be printed yet.
pub async fn fetch(
    State(state): State<Arc<AppState>>,
    ActivityTenant(tenant): ActivityTenant,
) -> Result<ApiResponse<Option<PrintItem>>, ApiError> {
    Ok(ApiResponse(queue(&state, &tenant).poll_one()?))
}

pub async fn batch_fetch(
    State(state): State<Arc<AppState>>,
    ActivityTenant(tenant): ActivityTenant,
    Json(body): Json<BatchFetchRequest>,
) -> Result<ApiResponse<Vec<PrintItem>>, ApiError> {
    if body.count == 0 || body.count > MAX_BATCH_FETCH {
        return Err(ApiError::invalid(format!(
            "count must be between 1 and {}",
            MAX_BATCH_FETCH
        )));
    }
    Ok(ApiResponse(queue(&state, &tenant).poll_batch(body.count)?))
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    ActivityTenant(tenant): ActivityTenant,
    Path(name): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<ApiResponse<PrintItem>, ApiError> {
    let status = body
        .status
        .parse::<PrintingStatus>()
        .map_err(ApiError::invalid)?;
    Ok(ApiResponse(
        queue(&state, &tenant).update_status(&name, status)?,
    ))
}

/// Item with its position in the queue. Public, for visitors.
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    ActivityTenant(tenant): ActivityTenant,
    Path(name): Path<String>,
) -> Result<ApiResponse<PrintItem>, ApiError> {
    let item = queue(&state, &tenant)
        .get_item(&name)?
        .ok_or_else(|| KioskError::NotFound(format!("print item {}", name)))?;
    Ok(ApiResponse(item))
}

pub async fn query_all(
    State(state): State<Arc<AppState>>,
    ActivityTenant(tenant): ActivityTenant,
    Query(params): Query<QueryAllParams>,
) -> Result<ApiResponse<Vec<PrintItem>>, ApiError> {
    Ok(ApiResponse(
        queue(&state, &tenant).list_all(params.keyword.as_deref())?,
    ))
}

pub async fn get_queued_job_count(
    State(state): State<Arc<AppState>>,
    ActivityTenant(tenant): ActivityTenant,
) -> Result<ApiResponse<i64>, ApiError> {
    Ok(ApiResponse(queue(&state, &tenant).outstanding_jobs()?))
}

pub async fn set_queued_job_count(
    State(state): State<Arc<AppState>>,
    ActivityTenant(tenant): ActivityTenant,
    Json(body): Json<JobCountRequest>,
) -> Result<ApiResponse<i64>, ApiError> {
    let queue = queue(&state, &tenant);
    queue.set_outstanding_jobs(body.count)?;
    Ok(ApiResponse(queue.outstanding_jobs()?))
}

/// Printer job event; batch job names update every item they carry.
pub async fn printer_callback(
    State(state): State<Arc<AppState>>,
    ActivityTenant(tenant): ActivityTenant,
    Json(body): Json<PrinterCallbackRequest>,
) -> Result<ApiResponse<Vec<PrintItem>>, ApiError> {
    let updated = apply_printer_event(&queue(&state, &tenant), &body.job_name, body.event)?;
    Ok(ApiResponse(updated))
}
