//! Kiosk access token endpoints, used by the console to provision kiosks.

use axum::extract::{Path, State};
use std::sync::Arc;

use kiosk_core::{Credential, KioskError};

use super::error::{ApiError, ApiResponse};
use super::middleware::ActivityTenant;
use crate::state::AppState;

/// Current access token for the tenant, rotated when close to expiry.
pub async fn latest(
    State(state): State<Arc<AppState>>,
    ActivityTenant(tenant): ActivityTenant,
) -> Result<ApiResponse<Credential>, ApiError> {
    Ok(ApiResponse(state.access_tokens().get_latest(&tenant).await?))
}

/// An issued token that has not expired yet.
pub async fn lookup(
    State(state): State<Arc<AppState>>,
    ActivityTenant(tenant): ActivityTenant,
    Path(value): Path<String>,
) -> Result<ApiResponse<Credential>, ApiError> {
    let credential = state
        .access_tokens()
        .lookup(&tenant, &value)?
        .ok_or_else(|| KioskError::NotFound("access token".to_string()))?;
    Ok(ApiResponse(credential))
}
