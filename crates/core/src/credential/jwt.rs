//! HS256 JWTs for the generation provider.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header};
use serde::{Deserialize, Serialize};

use super::{Credential, CredentialError, CredentialSigner};
use crate::config::{CredentialConfig, ProviderConfig};
use crate::tenant::Tenant;

/// Claims carried by a provider JWT.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProviderClaims {
    /// Access key of the calling account.
    pub iss: String,
    /// Expiration (Unix timestamp seconds)
    pub exp: i64,
    /// Not valid before (Unix timestamp seconds)
    pub nbf: i64,
}

/// Signs provider JWTs with the tenant's key pair.
pub struct JwtSigner {
    provider: ProviderConfig,
    validity: Duration,
    refresh_margin: Duration,
    not_before_skew: Duration,
}

impl JwtSigner {
    pub fn new(provider: ProviderConfig, config: &CredentialConfig) -> Self {
        Self {
            provider,
            validity: Duration::seconds(config.jwt_validity_secs as i64),
            refresh_margin: Duration::seconds(config.jwt_refresh_margin_secs as i64),
            not_before_skew: Duration::seconds(config.jwt_not_before_skew_secs as i64),
        }
    }
}

impl CredentialSigner for JwtSigner {
    fn kind(&self) -> &'static str {
        "jwt"
    }

    fn sign(
        &self,
        tenant: &Tenant,
        id: u64,
        now: DateTime<Utc>,
    ) -> Result<Credential, CredentialError> {
        let keys = self.provider.keys_for(tenant.as_str());
        if keys.access_key.is_empty() || keys.secret_key.is_empty() {
            return Err(CredentialError::MissingKeys(tenant.to_string()));
        }

        let expire_at = now + self.validity;
        let claims = ProviderClaims {
            iss: keys.access_key,
            exp: expire_at.timestamp(),
            nbf: (now - self.not_before_skew).timestamp(),
        };

        let value = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(keys.secret_key.as_bytes()),
        )
        .map_err(|e| CredentialError::Signing(e.to_string()))?;

        Ok(Credential {
            id,
            value,
            issued_at: now,
            refresh_at: expire_at - self.refresh_margin,
            expire_at,
        })
    }
}
