//! Entry point wiring the per-tenant services over shared infrastructure.

use std::sync::Arc;

use crate::admin::{AdminConfig, AdminSettings};
use crate::casting::CastingQueue;
use crate::compositor::Compositor;
use crate::config::{PrintingConfig, TasksConfig};
use crate::locks::KeyedLocks;
use crate::orchestrator::TaskOrchestrator;
use crate::printing::PrintQueue;
use crate::provider::GenerationProvider;
use crate::store::{KvStore, NamespacedStore};
use crate::task::TaskType;
use crate::tenant::Tenant;

/// Shared state behind every tenant's orchestrator and queues.
///
/// Services handed out by this type are scoped to one tenant: their storage
/// is wrapped in a [`NamespacedStore`] and their locks are keyed by tenant.
pub struct Kiosk {
    store: Arc<dyn KvStore>,
    pub(crate) provider: Arc<dyn GenerationProvider>,
    pub(crate) compositor: Arc<dyn Compositor>,
    pub(crate) tasks: Arc<TasksConfig>,
    pub(crate) printing: PrintingConfig,
    pub(crate) task_locks: Arc<KeyedLocks<tokio::sync::Mutex<()>>>,
    casting_locks: Arc<KeyedLocks<std::sync::Mutex<()>>>,
}

impl Kiosk {
    pub fn new(
        store: Arc<dyn KvStore>,
        provider: Arc<dyn GenerationProvider>,
        compositor: Arc<dyn Compositor>,
        tasks: TasksConfig,
        printing: PrintingConfig,
    ) -> Self {
        Self {
            store,
            provider,
            compositor,
            tasks: Arc::new(tasks),
            printing,
            task_locks: Arc::new(KeyedLocks::new()),
            casting_locks: Arc::new(KeyedLocks::new()),
        }
    }

    pub fn tasks_config(&self) -> &TasksConfig {
        &self.tasks
    }

    pub fn printing_config(&self) -> &PrintingConfig {
        &self.printing
    }

    /// Storage as seen by `tenant`.
    pub fn tenant_store(&self, tenant: &Tenant) -> Arc<dyn KvStore> {
        Arc::new(NamespacedStore::new(self.store.clone(), tenant.clone()))
    }

    /// Runtime settings of `tenant`, defaulting to the configuration file.
    pub fn admin_settings(&self, tenant: &Tenant) -> AdminSettings {
        AdminSettings::new(
            self.tenant_store(tenant),
            AdminConfig::from_config(&self.tasks, &self.printing),
        )
    }

    pub fn orchestrator(&self, tenant: &Tenant) -> TaskOrchestrator {
        TaskOrchestrator::new(self, tenant)
    }

    pub fn print_queue(&self, tenant: &Tenant, task_type: TaskType) -> PrintQueue {
        PrintQueue::new(
            self.tenant_store(tenant),
            task_type,
            self.printing.max_outstanding_jobs,
        )
    }

    pub fn casting_queue(&self, tenant: &Tenant) -> CastingQueue {
        CastingQueue::new(
            self.tenant_store(tenant),
            tenant.clone(),
            self.casting_locks.clone(),
        )
    }
}
