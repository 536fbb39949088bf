//! Task orchestration against the generation provider.
//!
//! A task is created by fanning out one provider call per sub-task and is
//! advanced by re-querying all sub-tasks when a client polls it.

mod runner;
mod types;

pub use runner::TaskOrchestrator;
pub use types::{aggregate_status, ImageMode};
