//! Runtime settings the console changes during an event.

use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::info;

use kiosk_core::{AdminConfig, AdminConfigUpdate};

use super::error::{ApiError, ApiResponse};
use super::middleware::{ActivityTenant, AuthUser};
use crate::state::AppState;

pub async fn get_admin_config(
    State(state): State<Arc<AppState>>,
    ActivityTenant(tenant): ActivityTenant,
) -> Result<ApiResponse<AdminConfig>, ApiError> {
    Ok(ApiResponse(state.kiosk().admin_settings(&tenant).get()?))
}

/// Merge the given fields into the tenant's settings and return the result.
pub async fn update_admin_config(
    State(state): State<Arc<AppState>>,
    ActivityTenant(tenant): ActivityTenant,
    AuthUser(user): AuthUser,
    Json(update): Json<AdminConfigUpdate>,
) -> Result<ApiResponse<AdminConfig>, ApiError> {
    let config = state.kiosk().admin_settings(&tenant).update(&update)?;
    info!(tenant = %tenant, user = %user, "Admin settings changed");
    Ok(ApiResponse(config))
}
