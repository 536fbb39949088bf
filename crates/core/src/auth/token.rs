//! Management token authentication.

use async_trait::async_trait;
use std::collections::HashMap;

use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Scheme of the `Authorization` header carrying kiosk tokens.
pub const TOKEN_SCHEME: &str = "Token ";

/// Token from an `Authorization: Token <value>` header.
///
/// `headers` must use lowercase names, as in [`AuthRequest`].
pub fn token_from_headers(headers: &HashMap<String, String>) -> Option<&str> {
    let header = headers.get("authorization")?;
    header
        .strip_prefix(TOKEN_SCHEME)
        .or_else(|| header.strip_prefix("token "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authenticator for operator (management) endpoints.
///
/// A tenant with its own token must present that token; other tenants use the
/// shared one.
pub struct ManagementTokenAuthenticator {
    shared_token: Option<String>,
    tenant_tokens: HashMap<String, String>,
}

impl ManagementTokenAuthenticator {
    pub fn new(shared_token: Option<String>, tenant_tokens: HashMap<String, String>) -> Self {
        Self {
            shared_token,
            tenant_tokens,
        }
    }

    fn expected_for(&self, tenant: &str) -> Option<&str> {
        self.tenant_tokens
            .get(tenant)
            .or(self.shared_token.as_ref())
            .map(String::as_str)
    }
}

#[async_trait]
impl Authenticator for ManagementTokenAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let provided = token_from_headers(&request.headers).ok_or(AuthError::NotAuthenticated)?;
        let expected = self.expected_for(request.tenant.as_str()).ok_or_else(|| {
            AuthError::InvalidCredentials(format!(
                "no management token configured for tenant {}",
                request.tenant
            ))
        })?;

        if constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
            Ok(Identity {
                user_id: "manager".to_string(),
                method: "token".to_string(),
                tenant: request.tenant.clone(),
            })
        } else {
            Err(AuthError::InvalidCredentials("Invalid token".to_string()))
        }
    }

    fn method_name(&self) -> &'static str {
        "token"
    }
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
