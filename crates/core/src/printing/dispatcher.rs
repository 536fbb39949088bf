//! Background consumer that feeds the print queue to a physical printer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::{PrintItem, PrintQueue, PrinterEvent, PrintingStatus};
use crate::config::DispatcherConfig;
use crate::error::KioskError;

/// Prefix of job names that carry several print items.
pub const BATCH_JOB_PREFIX: &str = "Batch:";
/// Separator between item names inside a batch job name.
pub const BATCH_JOB_DELIMITER: char = '-';

#[derive(Debug, Error)]
pub enum PrinterError {
    #[error("Printer unavailable: {0}")]
    Unavailable(String),

    #[error("Printer rejected job: {0}")]
    Rejected(String),
}

/// A physical printer.
#[async_trait]
pub trait PrinterDriver: Send + Sync {
    /// Name of this printer (for logging).
    fn name(&self) -> &str;

    /// Whether the printer currently accepts jobs.
    async fn is_accepting_jobs(&self) -> Result<bool, PrinterError>;

    /// Jobs submitted but not yet finished.
    async fn queued_jobs(&self) -> Result<i64, PrinterError>;

    /// Submit one job printing `image_urls` in order.
    async fn submit(&self, job_name: &str, image_urls: &[String]) -> Result<(), PrinterError>;
}

/// Printer job name for a set of items; several items form a batch job.
pub fn job_name(items: &[PrintItem]) -> String {
    match items {
        [single] => single.name.clone(),
        _ => {
            let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
            format!(
                "{}{}",
                BATCH_JOB_PREFIX,
                names.join(&BATCH_JOB_DELIMITER.to_string())
            )
        }
    }
}

/// Item names a printer job name stands for.
pub fn job_item_names(job_name: &str) -> Vec<String> {
    match job_name.strip_prefix(BATCH_JOB_PREFIX) {
        Some(batch) => batch
            .split(BATCH_JOB_DELIMITER)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect(),
        None => vec![job_name.to_string()],
    }
}

/// Polls the print queue on a fixed tick and submits jobs to the printer.
///
/// One dispatcher serves one physical printer; the queue is not designed for
/// several consumers.
pub struct PrintDispatcher {
    config: DispatcherConfig,
    queue: Arc<PrintQueue>,
    driver: Arc<dyn PrinterDriver>,

    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl PrintDispatcher {
    pub fn new(
        config: DispatcherConfig,
        queue: Arc<PrintQueue>,
        driver: Arc<dyn PrinterDriver>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            queue,
            driver,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Start the dispatch loop.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Print dispatcher already running");
            return;
        }

        let running = Arc::clone(&self.running);
        let queue = Arc::clone(&self.queue);
        let driver = Arc::clone(&self.driver);
        let config = self.config.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!(printer = driver.name(), "Print dispatcher started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Print dispatcher received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_millis(config.tick_interval_ms)) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        if let Err(e) = Self::dispatch_once(&queue, driver.as_ref(), config.batch_size).await {
                            warn!("Print dispatch error: {}", e);
                        }
                    }
                }
            }
            info!("Print dispatcher stopped");
        });
    }

    /// Stop the dispatch loop.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Print dispatcher not running");
            return;
        }
        let _ = self.shutdown_tx.send(());
    }

    /// Run one dispatch cycle. Returns the submitted job name, if any.
    pub async fn tick(&self) -> Result<Option<String>, KioskError> {
        Self::dispatch_once(&self.queue, self.driver.as_ref(), self.config.batch_size).await
    }

    async fn dispatch_once(
        queue: &PrintQueue,
        driver: &dyn PrinterDriver,
        batch_size: usize,
    ) -> Result<Option<String>, KioskError> {
        let accepting = driver
            .is_accepting_jobs()
            .await
            .map_err(|e| KioskError::TransientIo(e.to_string()))?;
        if !accepting {
            debug!(printer = driver.name(), "Printer not accepting jobs");
            return Ok(None);
        }

        let queued = driver
            .queued_jobs()
            .await
            .map_err(|e| KioskError::TransientIo(e.to_string()))?;
        queue.set_outstanding_jobs(queued)?;

        let items = queue.poll_batch(batch_size.max(1))?;
        if items.is_empty() {
            return Ok(None);
        }

        let job = job_name(&items);
        let urls: Vec<String> = items
            .iter()
            .filter_map(|item| item.task.output.as_ref().map(|o| o.url.clone()))
            .collect();

        match driver.submit(&job, &urls).await {
            Ok(()) => {
                info!(job = %job, items = items.len(), "Submitted print job");
            }
            Err(e) => {
                error!(job = %job, "Print submission failed: {}", e);
                for item in &items {
                    queue.update_status(&item.name, PrintingStatus::Failed)?;
                }
            }
        }

        Ok(Some(job))
    }

    /// Apply a printer callback to every item of the job.
    pub fn handle_event(
        &self,
        job_name: &str,
        event: PrinterEvent,
    ) -> Result<Vec<PrintItem>, KioskError> {
        apply_printer_event(&self.queue, job_name, event)
    }
}

/// Apply a printer callback for `job_name` to each item it names.
///
/// Items that no longer exist are skipped.
pub fn apply_printer_event(
    queue: &PrintQueue,
    job_name: &str,
    event: PrinterEvent,
) -> Result<Vec<PrintItem>, KioskError> {
    let status = event.status();
    let mut updated = Vec::new();
    for name in job_item_names(job_name) {
        match queue.update_status(&name, status) {
            Ok(item) => updated.push(item),
            Err(KioskError::NotFound(_)) => {
                warn!(job = %job_name, name = %name, "Printer event for unknown item");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(updated)
}
