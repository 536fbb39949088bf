//! Authentication, tenant and metrics middleware for API routes.

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use kiosk_core::{token_from_headers, AuthError, AuthRequest, Identity, KioskError, Tenant};

use super::error::ApiError;
use crate::metrics::{
    normalize_path, AUTH_FAILURES_TOTAL, HTTP_REQUESTS_IN_FLIGHT, HTTP_REQUESTS_TOTAL,
    HTTP_REQUEST_DURATION,
};
use crate::state::AppState;

/// Header naming the event a request belongs to.
pub const TENANT_HEADER: &str = "activity";

/// Metrics middleware that tracks HTTP request duration and counts.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());

    HTTP_REQUESTS_IN_FLIGHT.inc();

    let response = next.run(request).await;

    HTTP_REQUESTS_IN_FLIGHT.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path, &status])
        .observe(duration);
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    response
}

/// Tenant named by the `Activity` header; the unnamed tenant if absent.
pub fn tenant_from_headers(headers: &HeaderMap) -> Tenant {
    headers
        .get(TENANT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(Tenant::new)
        .unwrap_or_default()
}

/// Headers as a map with lowercase names.
fn header_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect()
}

/// Management guard: validates the request with the configured authenticator.
///
/// On success the [`Identity`] is inserted into the request extensions.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let tenant = tenant_from_headers(request.headers());
    let authenticator = state.authenticator();

    if authenticator.is_open() {
        request.extensions_mut().insert(Identity::anonymous(tenant));
        return Ok(next.run(request).await);
    }

    let source_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    let auth_request = AuthRequest {
        headers: header_map(request.headers()),
        source_ip,
        tenant,
    };

    match authenticator.authenticate(&auth_request).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            Ok(next.run(request).await)
        }
        Err(AuthError::NotAuthenticated) => {
            AUTH_FAILURES_TOTAL
                .with_label_values(&["management", "not_authenticated"])
                .inc();
            Err(ApiError::Unauthorized("Management token required".to_string()))
        }
        Err(AuthError::InvalidCredentials(msg)) => {
            debug!(tenant = %auth_request.tenant, "Rejected management token: {}", msg);
            AUTH_FAILURES_TOTAL
                .with_label_values(&["management", "invalid_credentials"])
                .inc();
            Err(ApiError::Unauthorized("Invalid management token".to_string()))
        }
        Err(e) => {
            AUTH_FAILURES_TOTAL
                .with_label_values(&["management", "internal_error"])
                .inc();
            Err(ApiError::Kiosk(KioskError::Inconsistent(e.to_string())))
        }
    }
}

/// Kiosk guard: requires a kiosk access token issued for the request's tenant.
///
/// Disabled when `auth.require_access_token` is false.
pub async fn access_token_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.config().auth.require_access_token {
        return Ok(next.run(request).await);
    }

    let tenant = tenant_from_headers(request.headers());
    let headers = header_map(request.headers());
    let Some(token) = token_from_headers(&headers) else {
        AUTH_FAILURES_TOTAL
            .with_label_values(&["access", "not_authenticated"])
            .inc();
        return Err(ApiError::Unauthorized("Access token required".to_string()));
    };

    match state.access_tokens().validate(&tenant, token) {
        Ok(true) => Ok(next.run(request).await),
        Ok(false) => {
            debug!(tenant = %tenant, "Rejected access token");
            AUTH_FAILURES_TOTAL
                .with_label_values(&["access", "invalid_credentials"])
                .inc();
            Err(ApiError::Unauthorized("Invalid or expired access token".to_string()))
        }
        Err(e) => {
            AUTH_FAILURES_TOTAL
                .with_label_values(&["access", "internal_error"])
                .inc();
            Err(e.into())
        }
    }
}

/// Extractor for the tenant a request addresses.
#[derive(Debug, Clone)]
pub struct ActivityTenant(pub Tenant);

impl<S> FromRequestParts<S> for ActivityTenant
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        std::future::ready(Ok(ActivityTenant(tenant_from_headers(&parts.headers))))
    }
}

/// Extractor for the authenticated operator.
///
/// Falls back to "anonymous" if no identity is present.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        let user_id = parts
            .extensions
            .get::<Identity>()
            .map(|id| id.user_id.clone())
            .unwrap_or_else(|| "anonymous".to_string());
        std::future::ready(Ok(AuthUser(user_id)))
    }
}
