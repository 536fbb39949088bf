//! FIFO print queue with deduplication and admission control.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{PrintItem, PrintingStatus};
use crate::error::KioskError;
use crate::metrics::{PRINT_ITEMS_ENQUEUED, PRINT_POLLS};
use crate::admin::stored_admin_config;
use crate::store::{get_i64, get_json, set_json, KvStore, StoreError};
use crate::task::{Task, TaskType};

/// Print queue for one task type.
///
/// Keys (relative to the tenant namespace):
/// - `printing:<code>`: the item record
/// - `printing_queue_<TYPE>`: FIFO of items waiting for the printer
/// - `printing_history_<TYPE>`: every enqueued item, newest first
/// - `printer_queued_job_count_<TYPE>`: jobs outstanding at the printer
pub struct PrintQueue {
    store: Arc<dyn KvStore>,
    task_type: TaskType,
    max_outstanding_jobs: i64,
}

impl PrintQueue {
    pub fn new(store: Arc<dyn KvStore>, task_type: TaskType, max_outstanding_jobs: i64) -> Self {
        Self {
            store,
            task_type,
            max_outstanding_jobs,
        }
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    /// Queue key of the item for task `code`.
    pub fn item_name(code: &str) -> String {
        format!("printing:{}", code)
    }

    /// Accept either `printing:<code>` or a bare `<code>`.
    fn normalize_name(name: &str) -> String {
        if name.starts_with("printing:") {
            name.to_string()
        } else {
            Self::item_name(name)
        }
    }

    fn queue_key(&self) -> String {
        format!("printing_queue_{}", self.task_type)
    }

    fn history_key(&self) -> String {
        format!("printing_history_{}", self.task_type)
    }

    fn outstanding_key(&self) -> String {
        format!("printer_queued_job_count_{}", self.task_type)
    }

    fn load(&self, name: &str) -> Result<Option<PrintItem>, KioskError> {
        Ok(get_json(self.store.as_ref(), name)?)
    }

    fn save(&self, item: &PrintItem) -> Result<(), KioskError> {
        let mut stored = item.clone();
        stored.ahead = None;
        set_json(self.store.as_ref(), &stored.name, &stored)?;
        Ok(())
    }

    /// Enqueue a finished task for printing.
    ///
    /// Fails with [`KioskError::DuplicateOperation`] if the task was already
    /// enqueued, unless `allow_duplicate` is set.
    pub fn add_task(&self, task: &Task, allow_duplicate: bool) -> Result<PrintItem, KioskError> {
        if task.task_type != self.task_type {
            return Err(KioskError::Validation(format!(
                "task {} is {} but this queue prints {}",
                task.name, task.task_type, self.task_type
            )));
        }

        let name = Self::item_name(&task.name);
        let now = Utc::now();
        let item = PrintItem {
            id: Uuid::new_v4().to_string(),
            name: name.clone(),
            task: task.clone(),
            status: PrintingStatus::Ready,
            created_at: now,
            updated_at: now,
            ahead: None,
        };
        if allow_duplicate {
            self.save(&item)?;
        } else {
            // Claiming the record is the dedup check
            let raw = serde_json::to_string(&item).map_err(StoreError::from)?;
            if !self.store.set_nx(&name, &raw)? {
                return Err(KioskError::DuplicateOperation(format!(
                    "{} has already been sent to the printer",
                    task.name
                )));
            }
        }
        self.store.lpush(&self.queue_key(), &name)?;
        self.store.lpush(&self.history_key(), &name)?;

        PRINT_ITEMS_ENQUEUED
            .with_label_values(&[self.task_type.as_str()])
            .inc();
        info!(name = %name, task_type = %self.task_type, "Enqueued print item");

        self.get_item(&name)?
            .ok_or_else(|| KioskError::Inconsistent(format!("{} vanished after enqueue", name)))
    }

    /// Admission limit in effect, as saved by an operator or configured.
    pub fn max_outstanding_jobs(&self) -> Result<i64, KioskError> {
        Ok(stored_admin_config(self.store.as_ref())?
            .map(|c| c.max_printer_job_count)
            .unwrap_or(self.max_outstanding_jobs))
    }

    /// Hand the oldest waiting item to the printer.
    ///
    /// Returns `None` when the queue is empty, when the printer already has
    /// more outstanding jobs than allowed, or when the popped entry has no
    /// record left. A dangling entry is consumed, so the next poll moves on.
    pub fn poll_one(&self) -> Result<Option<PrintItem>, KioskError> {
        let outstanding = self.outstanding_jobs()?;
        let max = self.max_outstanding_jobs()?;
        if outstanding > max {
            PRINT_POLLS.with_label_values(&["throttled"]).inc();
            debug!(outstanding, max, "Printer busy, not dispatching");
            return Ok(None);
        }

        let Some(name) = self.store.rpop(&self.queue_key())? else {
            PRINT_POLLS.with_label_values(&["empty"]).inc();
            return Ok(None);
        };
        let Some(mut item) = self.load(&name)? else {
            PRINT_POLLS.with_label_values(&["dangling"]).inc();
            warn!(name = %name, "Dropped queue entry without record");
            return Ok(None);
        };

        item.status = PrintingStatus::Queuing;
        item.updated_at = Utc::now();
        self.save(&item)?;

        PRINT_POLLS.with_label_values(&["dispatched"]).inc();
        info!(name = %name, "Dispatched print item");
        item.ahead = Some(outstanding);
        Ok(Some(item))
    }

    /// Poll up to `count` items, stopping early when nothing is admitted.
    pub fn poll_batch(&self, count: usize) -> Result<Vec<PrintItem>, KioskError> {
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            match self.poll_one()? {
                Some(item) => items.push(item),
                None => break,
            }
        }
        Ok(items)
    }

    /// Overwrite the status of an item.
    pub fn update_status(
        &self,
        name: &str,
        status: PrintingStatus,
    ) -> Result<PrintItem, KioskError> {
        let name = Self::normalize_name(name);
        let name = name.as_str();
        let mut item = self
            .load(name)?
            .ok_or_else(|| KioskError::NotFound(format!("print item {}", name)))?;
        let previous = item.status;
        item.status = status;
        item.updated_at = Utc::now();
        self.save(&item)?;
        info!(name = %name, from = %previous, to = %status, "Print item status updated");
        Ok(item)
    }

    /// Item with its current ahead-count.
    pub fn get_item(&self, name: &str) -> Result<Option<PrintItem>, KioskError> {
        let name = Self::normalize_name(name);
        let name = name.as_str();
        let Some(mut item) = self.load(name)? else {
            return Ok(None);
        };

        item.ahead = match item.status {
            PrintingStatus::Ready => {
                let waiting = self.store.lrange(&self.queue_key())?;
                let outstanding = self.outstanding_jobs()?;
                // Head holds the newest entry; everything towards the tail goes first
                waiting
                    .iter()
                    .position(|n| n == name)
                    .map(|index| (waiting.len() - 1 - index) as i64 + outstanding)
            }
            PrintingStatus::Queuing => Some(self.outstanding_jobs()?),
            PrintingStatus::Printing => Some(0),
            _ => Some(-1),
        };
        Ok(Some(item))
    }

    /// Every enqueued item, newest first, optionally filtered by a
    /// case-insensitive substring of its name.
    pub fn list_all(&self, keyword: Option<&str>) -> Result<Vec<PrintItem>, KioskError> {
        let keyword = keyword
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty());

        let mut seen = HashSet::new();
        let mut items = Vec::new();
        for name in self.store.lrange(&self.history_key())? {
            if !seen.insert(name.clone()) {
                continue;
            }
            if let Some(keyword) = &keyword {
                if !name.to_lowercase().contains(keyword.as_str()) {
                    continue;
                }
            }
            if let Some(item) = self.load(&name)? {
                items.push(item);
            }
        }
        Ok(items)
    }

    /// Jobs currently outstanding at the printer.
    pub fn outstanding_jobs(&self) -> Result<i64, KioskError> {
        Ok(get_i64(self.store.as_ref(), &self.outstanding_key())?.unwrap_or(0))
    }

    /// Record the printer's outstanding job count.
    pub fn set_outstanding_jobs(&self, count: i64) -> Result<(), KioskError> {
        self.store
            .set(&self.outstanding_key(), &count.max(0).to_string())?;
        Ok(())
    }

    /// Number of items waiting to be polled.
    pub fn waiting(&self) -> Result<usize, KioskError> {
        Ok(self.store.llen(&self.queue_key())?)
    }
}
