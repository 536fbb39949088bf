//! Operator settings that can change while an event is running.
//!
//! The configuration file provides the starting values. Once an operator saves
//! settings for a tenant they are stored under that tenant's namespace and
//! take precedence over the file.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{PrintingConfig, TasksConfig};
use crate::error::KioskError;
use crate::store::{get_json, set_json, KvStore};
use crate::task::TaskType;

const ADMIN_CONFIG_KEY: &str = "admin_config";

/// Runtime switches of one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminConfig {
    pub allow_print: bool,
    pub image_service_online: bool,
    pub video_service_online: bool,
    /// Admission limit on jobs outstanding at the printer
    pub max_printer_job_count: i64,
}

impl AdminConfig {
    pub fn from_config(tasks: &TasksConfig, printing: &PrintingConfig) -> Self {
        Self {
            allow_print: printing.allow_print,
            image_service_online: tasks.image_online,
            video_service_online: tasks.video_online,
            max_printer_job_count: printing.max_outstanding_jobs,
        }
    }

    pub fn is_online(&self, task_type: TaskType) -> bool {
        match task_type {
            TaskType::StyledImage => self.image_service_online,
            TaskType::VideoEffect => self.video_service_online,
        }
    }
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminConfigUpdate {
    pub allow_print: Option<bool>,
    pub image_service_online: Option<bool>,
    pub video_service_online: Option<bool>,
    pub max_printer_job_count: Option<i64>,
}

impl AdminConfigUpdate {
    fn apply(&self, mut config: AdminConfig) -> AdminConfig {
        if let Some(v) = self.allow_print {
            config.allow_print = v;
        }
        if let Some(v) = self.image_service_online {
            config.image_service_online = v;
        }
        if let Some(v) = self.video_service_online {
            config.video_service_online = v;
        }
        if let Some(v) = self.max_printer_job_count {
            config.max_printer_job_count = v;
        }
        config
    }
}

/// Settings stored for a tenant, if an operator ever saved any.
pub fn stored_admin_config(store: &dyn KvStore) -> Result<Option<AdminConfig>, KioskError> {
    Ok(get_json(store, ADMIN_CONFIG_KEY)?)
}

/// Reads and writes the settings of one tenant.
pub struct AdminSettings {
    store: Arc<dyn KvStore>,
    defaults: AdminConfig,
}

impl AdminSettings {
    pub fn new(store: Arc<dyn KvStore>, defaults: AdminConfig) -> Self {
        Self { store, defaults }
    }

    /// Effective settings: the stored ones, else the configured defaults.
    pub fn get(&self) -> Result<AdminConfig, KioskError> {
        Ok(stored_admin_config(self.store.as_ref())?.unwrap_or_else(|| self.defaults.clone()))
    }

    /// Apply `update` to the effective settings and persist the result.
    pub fn update(&self, update: &AdminConfigUpdate) -> Result<AdminConfig, KioskError> {
        if update.max_printer_job_count.is_some_and(|n| n < 0) {
            return Err(KioskError::Validation(
                "max_printer_job_count cannot be negative".to_string(),
            ));
        }
        let config = update.apply(self.get()?);
        set_json(self.store.as_ref(), ADMIN_CONFIG_KEY, &config)?;
        info!(
            allow_print = config.allow_print,
            image_online = config.image_service_online,
            video_online = config.video_service_online,
            max_printer_job_count = config.max_printer_job_count,
            "Admin settings saved"
        );
        Ok(config)
    }
}
