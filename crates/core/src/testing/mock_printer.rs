//! Mock printer driver for testing.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::printing::{PrinterDriver, PrinterError};

/// A recorded print job for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedPrintJob {
    pub job_name: String,
    pub image_urls: Vec<String>,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Mock implementation of the PrinterDriver trait.
///
/// - Records submitted jobs
/// - Reports a configurable queued-job count and accepting flag
/// - Fails the next submission on demand
#[derive(Debug)]
pub struct MockPrinterDriver {
    jobs: Arc<RwLock<Vec<RecordedPrintJob>>>,
    queued_jobs: Arc<RwLock<i64>>,
    accepting: Arc<RwLock<bool>>,
    /// If set, the next submission will fail with this error.
    next_error: Arc<RwLock<Option<PrinterError>>>,
}

impl Default for MockPrinterDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPrinterDriver {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(RwLock::new(Vec::new())),
            queued_jobs: Arc::new(RwLock::new(0)),
            accepting: Arc::new(RwLock::new(true)),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn submitted_jobs(&self) -> Vec<RecordedPrintJob> {
        self.jobs.read().await.clone()
    }

    pub async fn set_queued_jobs(&self, count: i64) {
        *self.queued_jobs.write().await = count;
    }

    pub async fn set_accepting(&self, accepting: bool) {
        *self.accepting.write().await = accepting;
    }

    pub async fn set_next_error(&self, error: PrinterError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl PrinterDriver for MockPrinterDriver {
    fn name(&self) -> &str {
        "mock-printer"
    }

    async fn is_accepting_jobs(&self) -> Result<bool, PrinterError> {
        Ok(*self.accepting.read().await)
    }

    async fn queued_jobs(&self) -> Result<i64, PrinterError> {
        Ok(*self.queued_jobs.read().await)
    }

    async fn submit(&self, job_name: &str, image_urls: &[String]) -> Result<(), PrinterError> {
        if let Some(e) = self.next_error.write().await.take() {
            return Err(e);
        }
        self.jobs.write().await.push(RecordedPrintJob {
            job_name: job_name.to_string(),
            image_urls: image_urls.to_vec(),
            timestamp: Utc::now(),
        });
        Ok(())
    }
}
