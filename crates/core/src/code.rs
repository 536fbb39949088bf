//! Human-readable task codes.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::TasksConfig;
use crate::store::{KvStore, StoreError};
use crate::task::TaskType;

/// Issues short codes like `No.1024` from an atomic per-type counter.
///
/// Codes are unique and strictly increasing within a (tenant, type) pair as
/// long as the store behind it is tenant-namespaced. The counter is seeded
/// with a per-type base, so the first code of a type is `base + 1`.
pub struct CodeGenerator {
    store: Arc<dyn KvStore>,
    prefix: String,
    bases: HashMap<TaskType, i64>,
}

impl CodeGenerator {
    pub fn new(store: Arc<dyn KvStore>, config: &TasksConfig) -> Self {
        let mut bases = HashMap::new();
        bases.insert(TaskType::StyledImage, config.image_code_base);
        bases.insert(TaskType::VideoEffect, config.video_code_base);
        Self {
            store,
            prefix: config.code_prefix.clone(),
            bases,
        }
    }

    fn counter_key(task_type: TaskType) -> String {
        format!("code_counter:{}", task_type)
    }

    /// Next code for `task_type`.
    pub fn next_code(&self, task_type: TaskType) -> Result<String, StoreError> {
        let base = self.bases.get(&task_type).copied().unwrap_or(0);
        let value = self
            .store
            .incr_from(&Self::counter_key(task_type), base)?;
        let code = format!("{}{}", self.prefix, value);
        debug!(task_type = %task_type, code = %code, "Issued task code");
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{NamespacedStore, SqliteKvStore};
    use crate::Tenant;
    use std::collections::HashSet;

    fn generator(store: Arc<dyn KvStore>) -> CodeGenerator {
        CodeGenerator::new(store, &TasksConfig::default())
    }

    #[test]
    fn test_codes_start_after_base_and_increase() {
        let codes = generator(Arc::new(SqliteKvStore::in_memory().unwrap()));

        assert_eq!(codes.next_code(TaskType::StyledImage).unwrap(), "No.1001");
        assert_eq!(codes.next_code(TaskType::StyledImage).unwrap(), "No.1002");
        assert_eq!(codes.next_code(TaskType::VideoEffect).unwrap(), "No.5001");
        assert_eq!(codes.next_code(TaskType::StyledImage).unwrap(), "No.1003");
    }

    #[test]
    fn test_tenants_have_independent_counters() {
        let base: Arc<dyn KvStore> = Arc::new(SqliteKvStore::in_memory().unwrap());
        let a = generator(Arc::new(NamespacedStore::new(
            Arc::clone(&base),
            Tenant::new("a"),
        )));
        let b = generator(Arc::new(NamespacedStore::new(base, Tenant::new("b"))));

        a.next_code(TaskType::StyledImage).unwrap();
        a.next_code(TaskType::StyledImage).unwrap();
        assert_eq!(b.next_code(TaskType::StyledImage).unwrap(), "No.1001");
    }

    #[tokio::test]
    async fn test_concurrent_codes_are_unique() {
        let codes = Arc::new(generator(Arc::new(SqliteKvStore::in_memory().unwrap())));

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let codes = Arc::clone(&codes);
                tokio::spawn(async move { codes.next_code(TaskType::StyledImage).unwrap() })
            })
            .collect();

        let mut issued = HashSet::new();
        for handle in handles {
            assert!(issued.insert(handle.await.unwrap()));
        }
        assert_eq!(issued.len(), 50);
        assert!(issued.contains("No.1001"));
        assert!(issued.contains("No.1050"));
    }
}
