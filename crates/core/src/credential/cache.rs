//! Per-tenant refresh-ahead cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tracing::info;

use super::{Credential, CredentialError, CredentialSigner};
use crate::locks::KeyedLocks;
use crate::metrics::CREDENTIALS_GENERATED;
use crate::store::{get_json, KvStore, NamespacedStore};
use crate::tenant::Tenant;

/// Caches the latest credential per tenant and regenerates it on demand.
///
/// Reads of a fresh credential only take a shared lock. When a credential is
/// missing or past its refresh time, callers for the same tenant serialize on
/// a per-tenant mutex and re-check before signing, so concurrent callers see
/// a single regeneration. Tenants never block each other.
///
/// Every issued credential is persisted under its value with a TTL equal to
/// its remaining lifetime, which is what [`validate`](Self::validate) checks.
pub struct CredentialCache<S> {
    signer: S,
    store: Arc<dyn KvStore>,
    latest: RwLock<HashMap<Tenant, Credential>>,
    locks: KeyedLocks<tokio::sync::Mutex<()>>,
    generated: AtomicU64,
}

impl<S: CredentialSigner> CredentialCache<S> {
    pub fn new(signer: S, store: Arc<dyn KvStore>) -> Self {
        Self {
            signer,
            store,
            latest: RwLock::new(HashMap::new()),
            locks: KeyedLocks::new(),
            generated: AtomicU64::new(0),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.signer.kind()
    }

    /// Number of credentials generated since startup, across tenants.
    pub fn generated_count(&self) -> u64 {
        self.generated.load(Ordering::Relaxed)
    }

    fn cached(&self, tenant: &Tenant) -> Option<Credential> {
        let latest = match self.latest.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        latest.get(tenant).cloned()
    }

    fn remember(&self, tenant: &Tenant, credential: Credential) {
        let mut latest = match self.latest.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        latest.insert(tenant.clone(), credential);
    }

    fn scoped(&self, tenant: &Tenant) -> NamespacedStore {
        NamespacedStore::new(Arc::clone(&self.store), tenant.clone())
    }

    fn record_key(&self, value: &str) -> String {
        format!("credential:{}:{}", self.signer.kind(), value)
    }

    /// Latest credential for `tenant`, generating a new one if needed.
    pub async fn get_latest(&self, tenant: &Tenant) -> Result<Credential, CredentialError> {
        if let Some(credential) = self.cached(tenant) {
            if credential.is_fresh(Utc::now()) {
                return Ok(credential);
            }
        }

        let lock = self.locks.get(tenant.as_str());
        let _guard = lock.lock().await;

        let now = Utc::now();
        let previous = self.cached(tenant);
        if let Some(credential) = &previous {
            if credential.is_fresh(now) {
                return Ok(credential.clone());
            }
        }

        let id = previous.map(|c| c.id + 1).unwrap_or(1);
        let credential = self.signer.sign(tenant, id, now)?;

        let ttl = (credential.expire_at - now).to_std().unwrap_or_default();
        let raw = serde_json::to_string(&credential)
            .map_err(|e| CredentialError::Signing(e.to_string()))?;
        self.scoped(tenant)
            .set_ex(&self.record_key(&credential.value), &raw, ttl)?;

        self.remember(tenant, credential.clone());
        self.generated.fetch_add(1, Ordering::Relaxed);
        CREDENTIALS_GENERATED
            .with_label_values(&[self.signer.kind()])
            .inc();

        info!(
            tenant = %tenant,
            kind = self.signer.kind(),
            id = credential.id,
            expire_at = %credential.expire_at,
            "Generated new credential"
        );

        Ok(credential)
    }

    /// Look up an issued, unexpired credential by value.
    pub fn lookup(
        &self,
        tenant: &Tenant,
        value: &str,
    ) -> Result<Option<Credential>, CredentialError> {
        let scoped = self.scoped(tenant);
        let credential: Option<Credential> = get_json(&scoped, &self.record_key(value))?;
        Ok(credential.filter(|c| c.is_valid(Utc::now())))
    }

    /// Whether `value` is an issued credential that has not expired.
    pub fn validate(&self, tenant: &Tenant, value: &str) -> Result<bool, CredentialError> {
        Ok(self.lookup(tenant, value)?.is_some())
    }
}
