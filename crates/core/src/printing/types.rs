//! Print queue data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::task::Task;

/// Lifecycle of a print item.
///
/// READY (waiting in the queue) -> QUEUING (handed to the printer) ->
/// PRINTING -> COMPLETED | FAILED | CANCELLED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrintingStatus {
    Ready,
    Queuing,
    Printing,
    Completed,
    Failed,
    Cancelled,
}

impl PrintingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PrintingStatus::Completed | PrintingStatus::Failed | PrintingStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrintingStatus::Ready => "READY",
            PrintingStatus::Queuing => "QUEUING",
            PrintingStatus::Printing => "PRINTING",
            PrintingStatus::Completed => "COMPLETED",
            PrintingStatus::Failed => "FAILED",
            PrintingStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for PrintingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrintingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "READY" => Ok(PrintingStatus::Ready),
            "QUEUING" => Ok(PrintingStatus::Queuing),
            "PRINTING" => Ok(PrintingStatus::Printing),
            "COMPLETED" => Ok(PrintingStatus::Completed),
            "FAILED" => Ok(PrintingStatus::Failed),
            "CANCELLED" => Ok(PrintingStatus::Cancelled),
            other => Err(format!("unknown printing status: {}", other)),
        }
    }
}

/// A request to physically print a finished task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintItem {
    pub id: String,
    /// Queue key, `printing:<code>`.
    pub name: String,
    pub task: Task,
    pub status: PrintingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Jobs that will print before this one, -1 once finished. Derived on
    /// read, never stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ahead: Option<i64>,
}

/// Printer-reported job events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrinterEvent {
    Completed,
    Failed,
    Cancelled,
    DataTransferred,
}

impl PrinterEvent {
    /// Print status an event moves an item to.
    pub fn status(&self) -> PrintingStatus {
        match self {
            PrinterEvent::Completed => PrintingStatus::Completed,
            PrinterEvent::Failed => PrintingStatus::Failed,
            PrinterEvent::Cancelled => PrintingStatus::Cancelled,
            PrinterEvent::DataTransferred => PrintingStatus::Printing,
        }
    }
}
