//! Key-value storage with string, list, counter and ordered-set primitives.
//!
//! All queue and cursor state lives behind [`KvStore`]. The SQLite backend
//! executes every primitive as a single statement (or a transaction) so each
//! one is atomic; callers that need several primitives to be atomic together
//! hold a lock from [`crate::KeyedLocks`] around them.

mod namespaced;
mod sqlite_store;

pub use namespaced::NamespacedStore;
pub use sqlite_store::SqliteKvStore;

use std::time::Duration;
use thiserror::Error;

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Value at {key} is not an integer: {value}")]
    NotAnInteger { key: String, value: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// An ordered-set member together with its score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredMember {
    pub member: String,
    pub score: i64,
}

/// Storage primitives used by the queues.
///
/// Lists are double-ended: `lpush` inserts at the head and `rpop` removes from
/// the tail, so a list used with those two operations is a FIFO. Ordered sets
/// rank members by ascending score, ties broken by member.
pub trait KvStore: Send + Sync {
    /// Read a string value. Expired values read as absent.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a string value without expiry.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Write a string value only when the key is absent or expired.
    ///
    /// Returns whether the value was written.
    fn set_nx(&self, key: &str, value: &str) -> Result<bool, StoreError>;

    /// Write a string value that expires after `ttl`.
    fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Delete a key of any kind. Returns whether anything was removed.
    fn del(&self, key: &str) -> Result<bool, StoreError>;

    /// Add `delta` to the integer at `key` (absent counts as 0) and return the result.
    fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError>;

    /// Increment the integer at `key`, seeding it with `base` when absent.
    ///
    /// The first call returns `base + 1`; later calls return one more than the
    /// previous value.
    fn incr_from(&self, key: &str, base: i64) -> Result<i64, StoreError>;

    /// Insert at the head of a list and return the new length.
    fn lpush(&self, key: &str, value: &str) -> Result<usize, StoreError>;

    /// Remove and return the tail of a list.
    fn rpop(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// All list elements, head first.
    fn lrange(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Number of list elements.
    fn llen(&self, key: &str) -> Result<usize, StoreError>;

    /// Insert or re-score a member.
    fn zadd(&self, key: &str, score: i64, member: &str) -> Result<(), StoreError>;

    /// Remove a member. Returns whether it was present.
    fn zrem(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// Zero-based ascending rank of a member.
    fn zrank(&self, key: &str, member: &str) -> Result<Option<usize>, StoreError>;

    /// Number of members.
    fn zcard(&self, key: &str) -> Result<usize, StoreError>;

    /// Number of members with `min <= score <= max`.
    fn zcount(&self, key: &str, min: i64, max: i64) -> Result<usize, StoreError>;

    /// Up to `count` members starting at ascending rank `start`.
    fn zrange(&self, key: &str, start: usize, count: usize)
        -> Result<Vec<ScoredMember>, StoreError>;

    /// Up to `count` members starting at descending rank `start`.
    fn zrevrange(
        &self,
        key: &str,
        start: usize,
        count: usize,
    ) -> Result<Vec<ScoredMember>, StoreError>;

    /// Members with `score <= max`, highest score first, skipping `offset`
    /// and returning at most `count`.
    fn zrevrange_by_score(
        &self,
        key: &str,
        max: i64,
        offset: usize,
        count: usize,
    ) -> Result<Vec<ScoredMember>, StoreError>;
}

/// Read and deserialize a JSON value.
pub fn get_json<T: serde::de::DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Serialize and write a JSON value.
pub fn set_json<T: serde::Serialize>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

/// Read an integer value, treating absence as `None`.
pub fn get_i64(store: &dyn KvStore, key: &str) -> Result<Option<i64>, StoreError> {
    match store.get(key)? {
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| StoreError::NotAnInteger {
                key: key.to_string(),
                value: raw,
            }),
        None => Ok(None),
    }
}
