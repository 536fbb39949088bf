//! Response envelope and the translation of core errors into HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, warn};

use kiosk_core::{CredentialError, KioskError};

/// Body of every kiosk response.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: Option<T>,
    /// Raw provider response when the provider rejected a request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_result: Option<serde_json::Value>,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

/// Successful response carrying `data`.
#[derive(Debug)]
pub struct ApiResponse<T>(pub T);

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(Envelope {
            status: "SUCCEED",
            message: None,
            data: Some(self.0),
            provider_result: None,
            timestamp: Utc::now().timestamp_millis(),
        })
        .into_response()
    }
}

/// Failure returned by a handler or middleware.
#[derive(Debug)]
pub enum ApiError {
    Kiosk(KioskError),
    Unauthorized(String),
}

impl ApiError {
    /// Request rejected because of malformed input.
    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError::Kiosk(KioskError::Validation(message.into()))
    }
}

impl From<KioskError> for ApiError {
    fn from(e: KioskError) -> Self {
        ApiError::Kiosk(e)
    }
}

impl From<CredentialError> for ApiError {
    fn from(e: CredentialError) -> Self {
        ApiError::Kiosk(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut provider_result = None;

        let (code, status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Kiosk(e) => match e {
                KioskError::Validation(_) => {
                    (StatusCode::BAD_REQUEST, "INVALID_REQUEST", e.to_string())
                }
                KioskError::DuplicateOperation(_) => {
                    (StatusCode::CONFLICT, "DUPLICATE_PRINT", e.to_string())
                }
                KioskError::ServiceOffline(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_OFFLINE",
                    e.to_string(),
                ),
                KioskError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string()),
                KioskError::Provider {
                    code,
                    message,
                    payload,
                } => {
                    warn!(code, message = %message, "Provider rejected request");
                    provider_result = Some(payload);
                    (
                        StatusCode::BAD_GATEWAY,
                        "KLING_OPEN_API_EXCEPTION",
                        format!("Provider error {}: {}", code, message),
                    )
                }
                KioskError::TransientIo(msg) => {
                    warn!(error = %msg, "Transient failure");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "FAILED",
                        "Temporarily unavailable, please retry".to_string(),
                    )
                }
                other => {
                    error!(error = %other, "Request failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "FAILED",
                        "Internal error".to_string(),
                    )
                }
            },
        };

        let body = Envelope::<()> {
            status,
            message: Some(message),
            data: None,
            provider_result,
            timestamp: Utc::now().timestamp_millis(),
        };
        (code, Json(body)).into_response()
    }
}
