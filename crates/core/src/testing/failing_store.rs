//! Store wrapper with injectable write failures.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::store::{KvStore, ScoredMember, StoreError};

/// An armed failure: the next `operation` on a key containing `key_part`.
#[derive(Debug, Clone)]
struct ArmedFailure {
    operation: &'static str,
    key_part: String,
}

/// Delegates to an inner store, failing selected writes once.
///
/// # Example
///
/// ```rust,ignore
/// let store = Arc::new(FailingStore::new(Arc::new(SqliteKvStore::in_memory()?)));
/// store.fail_next("zadd", "casting_queue_");
/// ```
pub struct FailingStore {
    inner: Arc<dyn KvStore>,
    armed: Mutex<Vec<ArmedFailure>>,
}

impl FailingStore {
    pub fn new(inner: Arc<dyn KvStore>) -> Self {
        Self {
            inner,
            armed: Mutex::new(Vec::new()),
        }
    }

    /// Fail the next `operation` (`set`, `zadd`, ...) on a key containing `key_part`.
    pub fn fail_next(&self, operation: &'static str, key_part: &str) {
        if let Ok(mut armed) = self.armed.lock() {
            armed.push(ArmedFailure {
                operation,
                key_part: key_part.to_string(),
            });
        }
    }

    fn check(&self, operation: &'static str, key: &str) -> Result<(), StoreError> {
        let Ok(mut armed) = self.armed.lock() else {
            return Ok(());
        };
        match armed
            .iter()
            .position(|f| f.operation == operation && key.contains(&f.key_part))
        {
            Some(index) => {
                armed.remove(index);
                Err(StoreError::Database("disk I/O error".to_string()))
            }
            None => Ok(()),
        }
    }
}

impl KvStore for FailingStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check("set", key)?;
        self.inner.set(key, value)
    }

    fn set_nx(&self, key: &str, value: &str) -> Result<bool, StoreError> {
        self.check("set_nx", key)?;
        self.inner.set_nx(key, value)
    }

    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.check("set_ex", key)?;
        self.inner.set_ex(key, value, ttl)
    }

    fn del(&self, key: &str) -> Result<bool, StoreError> {
        self.check("del", key)?;
        self.inner.del(key)
    }

    fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        self.check("incr_by", key)?;
        self.inner.incr_by(key, delta)
    }

    fn incr_from(&self, key: &str, base: i64) -> Result<i64, StoreError> {
        self.check("incr_from", key)?;
        self.inner.incr_from(key, base)
    }

    fn lpush(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        self.check("lpush", key)?;
        self.inner.lpush(key, value)
    }

    fn rpop(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check("rpop", key)?;
        self.inner.rpop(key)
    }

    fn lrange(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.inner.lrange(key)
    }

    fn llen(&self, key: &str) -> Result<usize, StoreError> {
        self.inner.llen(key)
    }

    fn zadd(&self, key: &str, score: i64, member: &str) -> Result<(), StoreError> {
        self.check("zadd", key)?;
        self.inner.zadd(key, score, member)
    }

    fn zrem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.check("zrem", key)?;
        self.inner.zrem(key, member)
    }

    fn zrank(&self, key: &str, member: &str) -> Result<Option<usize>, StoreError> {
        self.inner.zrank(key, member)
    }

    fn zcard(&self, key: &str) -> Result<usize, StoreError> {
        self.inner.zcard(key)
    }

    fn zcount(&self, key: &str, min: i64, max: i64) -> Result<usize, StoreError> {
        self.inner.zcount(key, min, max)
    }

    fn zrange(
        &self,
        key: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<ScoredMember>, StoreError> {
        self.inner.zrange(key, start, count)
    }

    fn zrevrange(
        &self,
        key: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<ScoredMember>, StoreError> {
        self.inner.zrevrange(key, start, count)
    }

    fn zrevrange_by_score(
        &self,
        key: &str,
        max: i64,
        offset: usize,
        count: usize,
    ) -> Result<Vec<ScoredMember>, StoreError> {
        self.inner.zrevrange_by_score(key, max, offset, count)
    }
}
