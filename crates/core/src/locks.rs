//! Registry of named locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Hands out one shared lock per key, creating it on first use.
///
/// Used to serialize critical sections that span several store operations,
/// e.g. casting set mutations together with their cursor bookkeeping.
pub struct KeyedLocks<L> {
    locks: Mutex<HashMap<String, Arc<L>>>,
}

impl<L: Default> KeyedLocks<L> {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Get the lock for `key`.
    pub fn get(&self, key: &str) -> Arc<L> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(locks.entry(key.to_string()).or_default())
    }

    /// Forget the lock for `key` unless someone still holds a handle to it.
    ///
    /// Callers drop their own handle first. A later `get` creates a fresh lock.
    pub fn release(&self, key: &str) {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(key);
        }
    }

    /// Number of keys that have a lock.
    pub fn len(&self) -> usize {
        match self.locks.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<L: Default> Default for KeyedLocks<L> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_key_returns_same_lock() {
        let locks: KeyedLocks<Mutex<()>> = KeyedLocks::new();
        let a = locks.get("casting:STYLED_IMAGE");
        let b = locks.get("casting:STYLED_IMAGE");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn test_different_keys_return_different_locks() {
        let locks: KeyedLocks<tokio::sync::Mutex<()>> = KeyedLocks::new();
        let a = locks.get("t1");
        let b = locks.get("t2");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn test_release_keeps_locks_still_in_use() {
        let locks: KeyedLocks<Mutex<()>> = KeyedLocks::new();
        let held = locks.get("task:No.1");
        drop(locks.get("task:No.2"));

        locks.release("task:No.1");
        locks.release("task:No.2");
        locks.release("task:missing");
        assert_eq!(locks.len(), 1);

        drop(held);
        locks.release("task:No.1");
        assert!(locks.is_empty());
    }
}
