//! Physical print queue and its printer-side consumer.

mod dispatcher;
mod queue;
mod types;

pub use dispatcher::{
    apply_printer_event, job_item_names, job_name, PrintDispatcher, PrinterDriver, PrinterError,
    BATCH_JOB_DELIMITER, BATCH_JOB_PREFIX,
};
pub use queue::PrintQueue;
pub use types::*;
