//! Tenant key namespacing.

use std::sync::Arc;
use std::time::Duration;

use super::{KvStore, ScoredMember, StoreError};
use crate::tenant::Tenant;

/// Decorator that rewrites every key to `<tenant>:<key>` before delegating.
///
/// Values and set members pass through untouched. With the empty tenant the
/// keys are used as given, so a tenant-less deployment sees plain keys.
pub struct NamespacedStore {
    inner: Arc<dyn KvStore>,
    tenant: Tenant,
}

impl NamespacedStore {
    pub fn new(inner: Arc<dyn KvStore>, tenant: Tenant) -> Self {
        Self { inner, tenant }
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    fn key(&self, key: &str) -> String {
        self.tenant.namespace(key)
    }
}

impl KvStore for NamespacedStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(&self.key(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.set(&self.key(key), value)
    }

    fn set_nx(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        self.inner.set_nx(&self.key(key), value)
    }

    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.inner.set_ex(&self.key(key), value, ttl)
    }

    fn del(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.del(&self.key(key))
    }

    fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        self.inner.incr_by(&self.key(key), delta)
    }

    fn incr_from(&self, key: &str, base: i64) -> Result<i64, StoreError> {
        self.inner.incr_from(&self.key(key), base)
    }

    fn lpush(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        self.inner.lpush(&self.key(key), value)
    }

    fn rpop(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.rpop(&self.key(key))
    }

    fn lrange(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.inner.lrange(&self.key(key))
    }

    fn llen(&self, key: &str) -> Result<usize, StoreError> {
        self.inner.llen(&self.key(key))
    }

    fn zadd(&self, key: &str, score: i64, member: &str) -> Result<(), StoreError> {
        self.inner.zadd(&self.key(key), score, member)
    }

    fn zrem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.inner.zrem(&self.key(key), member)
    }

    fn zrank(&self, key: &str, member: &str) -> Result<Option<usize>, StoreError> {
        self.inner.zrank(&self.key(key), member)
    }

    fn zcard(&self, key: &str) -> Result<usize, StoreError> {
        self.inner.zcard(&self.key(key))
    }

    fn zcount(&self, key: &str, min: i64, max: i64) -> Result<usize, StoreError> {
        self.inner.zcount(&self.key(key), min, max)
    }

    fn zrange(
        &self,
        key: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<ScoredMember>, StoreError> {
        self.inner.zrange(&self.key(key), start, count)
    }

    fn zrevrange(
        &self,
        key: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<ScoredMember>, StoreError> {
        self.inner.zrevrange(&self.key(key), start, count)
    }

    fn zrevrange_by_score(
        &self,
        key: &str,
        max: i64,
        offset: usize,
        count: usize,
    ) -> Result<Vec<ScoredMember>, StoreError> {
        self.inner
            .zrevrange_by_score(&self.key(key), max, offset, count)
    }
}
