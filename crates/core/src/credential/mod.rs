//! Short-lived credentials with refresh-ahead caching.
//!
//! Two kinds are issued: signed JWTs presented to the generation provider and
//! opaque access tokens that kiosks present when creating tasks. Both go
//! through [`CredentialCache`], which keeps the latest credential per tenant
//! and regenerates it once its refresh time has passed.

mod access_token;
mod cache;
mod jwt;

pub use access_token::AccessTokenSigner;
pub use cache::CredentialCache;
pub use jwt::{JwtSigner, ProviderClaims};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::StoreError;
use crate::tenant::Tenant;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("No signing keys configured for tenant {0}")]
    MissingKeys(String),

    #[error("Failed to sign credential: {0}")]
    Signing(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// An issued credential.
///
/// `refresh_at` is strictly before `expire_at`; the cache hands out the same
/// credential until `refresh_at`, after which a new one is generated while
/// the old one stays valid until it expires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Sequence number, 1 for the first credential of a tenant.
    pub id: u64,
    pub value: String,
    pub issued_at: DateTime<Utc>,
    pub refresh_at: DateTime<Utc>,
    pub expire_at: DateTime<Utc>,
}

impl Credential {
    /// Whether the cache may still hand this credential out.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.refresh_at > now
    }

    /// Whether the credential is still accepted.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.expire_at > now
    }
}

/// Produces new credentials of one kind.
pub trait CredentialSigner: Send + Sync {
    /// Short name used in storage keys and logs.
    fn kind(&self) -> &'static str;

    /// Create credential number `id` for `tenant`, issued at `now`.
    fn sign(&self, tenant: &Tenant, id: u64, now: DateTime<Utc>)
        -> Result<Credential, CredentialError>;
}
