//! Casting screen endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use kiosk_core::casting::MAX_PAGE_SIZE;
use kiosk_core::{CastingAction, CastingEntry, CastingListQuery, CastingPage};

use super::error::{ApiError, ApiResponse};
use super::middleware::{ActivityTenant, AuthUser};
use super::tasks::parse_task_type;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OperateRequest {
    pub name: String,
    pub action: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub keyword: Option<String>,
    pub score: Option<i64>,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_page_num")]
    pub page_num: usize,
}

fn default_page_size() -> usize {
    20
}

fn default_page_num() -> usize {
    1
}

#[derive(Debug, Deserialize)]
pub struct ScreenParams {
    #[serde(default = "default_screen_num")]
    pub num: usize,
}

fn default_screen_num() -> usize {
    1
}

pub async fn get_pinned(
    State(state): State<Arc<AppState>>,
    ActivityTenant(tenant): ActivityTenant,
    Path(task_type): Path<String>,
) -> Result<ApiResponse<Option<CastingEntry>>, ApiError> {
    let task_type = parse_task_type(&task_type)?;
    Ok(ApiResponse(
        state.kiosk().casting_queue(&tenant).get_pinned(task_type)?,
    ))
}

pub async fn count(
    State(state): State<Arc<AppState>>,
    ActivityTenant(tenant): ActivityTenant,
    Path(task_type): Path<String>,
) -> Result<ApiResponse<usize>, ApiError> {
    let task_type = parse_task_type(&task_type)?;
    Ok(ApiResponse(state.kiosk().casting_queue(&tenant).len(task_type)?))
}

pub async fn operate(
    State(state): State<Arc<AppState>>,
    ActivityTenant(tenant): ActivityTenant,
    AuthUser(user): AuthUser,
    Path(task_type): Path<String>,
    Json(body): Json<OperateRequest>,
) -> Result<ApiResponse<CastingEntry>, ApiError> {
    let task_type = parse_task_type(&task_type)?;
    let action = body.action.parse::<CastingAction>().map_err(ApiError::invalid)?;
    let entry = state
        .kiosk()
        .casting_queue(&tenant)
        .operate(task_type, &body.name, action)?;
    info!(tenant = %tenant, name = %entry.name, action = %action, user = %user, "Casting entry operated");
    Ok(ApiResponse(entry))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    ActivityTenant(tenant): ActivityTenant,
    Path(task_type): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<ApiResponse<CastingPage>, ApiError> {
    let task_type = parse_task_type(&task_type)?;
    let query = CastingListQuery {
        keyword: params.keyword,
        score: params.score,
        page_size: params.page_size,
        page_num: params.page_num,
    };
    Ok(ApiResponse(
        state.kiosk().casting_queue(&tenant).list(task_type, &query)?,
    ))
}

/// Next `num` entries of the display rotation.
pub async fn screen(
    State(state): State<Arc<AppState>>,
    ActivityTenant(tenant): ActivityTenant,
    Path(task_type): Path<String>,
    Query(params): Query<ScreenParams>,
) -> Result<ApiResponse<Vec<CastingEntry>>, ApiError> {
    let task_type = parse_task_type(&task_type)?;
    if params.num > MAX_PAGE_SIZE {
        return Err(ApiError::invalid(format!(
            "num must be at most {}",
            MAX_PAGE_SIZE
        )));
    }
    Ok(ApiResponse(
        state
            .kiosk()
            .casting_queue(&tenant)
            .screen(task_type, params.num)?,
    ))
}
