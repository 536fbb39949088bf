//! Opaque access tokens for task creation.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::{Credential, CredentialError, CredentialSigner};
use crate::config::CredentialConfig;
use crate::tenant::Tenant;

/// Issues random access tokens. Kiosks fetch the latest one through the
/// management API and present it when creating tasks.
pub struct AccessTokenSigner {
    validity: Duration,
    refresh_margin: Duration,
}

impl AccessTokenSigner {
    pub fn new(config: &CredentialConfig) -> Self {
        Self {
            validity: Duration::seconds(config.access_token_validity_secs as i64),
            refresh_margin: Duration::seconds(config.access_token_refresh_margin_secs as i64),
        }
    }
}

impl CredentialSigner for AccessTokenSigner {
    fn kind(&self) -> &'static str {
        "access_token"
    }

    fn sign(
        &self,
        _tenant: &Tenant,
        id: u64,
        now: DateTime<Utc>,
    ) -> Result<Credential, CredentialError> {
        let expire_at = now + self.validity;
        Ok(Credential {
            id,
            value: Uuid::new_v4().to_string(),
            issued_at: now,
            refresh_at: expire_at - self.refresh_margin,
            expire_at,
        })
    }
}
