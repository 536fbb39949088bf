use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Authenticator that accepts every management request as anonymous.
/// Only used when `auth.method = "none"` is configured explicitly.
pub struct NoneAuthenticator;

impl NoneAuthenticator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoneAuthenticator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Authenticator for NoneAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        Ok(Identity::anonymous(request.tenant.clone()))
    }

    fn method_name(&self) -> &'static str {
        "none"
    }

    fn is_open(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tenant::Tenant;
    use std::collections::HashMap;
    use std::net::IpAddr;

    #[tokio::test]
    async fn test_none_authenticator_returns_anonymous() {
        let auth = NoneAuthenticator::new();
        let request = AuthRequest {
            headers: HashMap::new(),
            source_ip: "127.0.0.1".parse::<IpAddr>().unwrap(),
            tenant: Tenant::new("expo"),
        };

        let identity = auth.authenticate(&request).await.unwrap();

        assert_eq!(identity.user_id, "anonymous");
        assert_eq!(identity.method, "none");
        assert_eq!(identity.tenant.as_str(), "expo");
    }

    #[test]
    fn test_none_authenticator_method_name() {
        let auth = NoneAuthenticator::new();
        assert_eq!(auth.method_name(), "none");
        assert!(auth.is_open());
    }

    #[test]
    fn test_none_authenticator_default() {
        let auth = NoneAuthenticator::default();
        assert_eq!(auth.method_name(), "none");
    }
}
