//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Tasks (creation, status transitions)
//! - Generation provider calls
//! - Print queue and casting queue activity
//! - Credential regeneration

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Tasks
// =============================================================================

/// Tasks created by type.
pub static TASKS_CREATED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("kiosk_tasks_created_total", "Total tasks created"),
        &["type"],
    )
    .unwrap()
});

/// Task status transitions observed while polling.
pub static TASK_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "kiosk_task_transitions_total",
            "Total task status transitions",
        ),
        &["type", "status"],
    )
    .unwrap()
});

/// Time from task creation until a terminal status was observed.
pub static TASK_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "kiosk_task_duration_seconds",
            "Task duration from creation to terminal status",
        )
        .buckets(vec![5.0, 10.0, 20.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["type", "status"],
    )
    .unwrap()
});

// =============================================================================
// Generation provider
// =============================================================================

/// Provider calls by operation and result.
pub static PROVIDER_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("kiosk_provider_requests_total", "Total provider requests"),
        &["operation", "result"], // operation: "create", "query"; result: "success", "error"
    )
    .unwrap()
});

/// Duration of one fan-out (all sub-task calls of a task).
pub static PROVIDER_FANOUT_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "kiosk_provider_fanout_duration_seconds",
            "Duration of a provider fan-out",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["operation"],
    )
    .unwrap()
});

// =============================================================================
// Queues
// =============================================================================

/// Print items enqueued.
pub static PRINT_ITEMS_ENQUEUED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("kiosk_print_items_enqueued_total", "Total print items enqueued"),
        &["type"],
    )
    .unwrap()
});

/// Print queue polls by outcome.
pub static PRINT_POLLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("kiosk_print_polls_total", "Total print queue polls"),
        &["outcome"], // "dispatched", "empty", "throttled"
    )
    .unwrap()
});

/// Casting operator actions.
pub static CASTING_OPERATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "kiosk_casting_operations_total",
            "Total casting queue operator actions",
        ),
        &["action"],
    )
    .unwrap()
});

// =============================================================================
// Credentials
// =============================================================================

/// Credentials generated by kind.
pub static CREDENTIALS_GENERATED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "kiosk_credentials_generated_total",
            "Total credentials generated",
        ),
        &["kind"],
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(TASKS_CREATED.clone()),
        Box::new(TASK_TRANSITIONS.clone()),
        Box::new(TASK_DURATION.clone()),
        Box::new(PROVIDER_REQUESTS.clone()),
        Box::new(PROVIDER_FANOUT_DURATION.clone()),
        Box::new(PRINT_ITEMS_ENQUEUED.clone()),
        Box::new(PRINT_POLLS.clone()),
        Box::new(CASTING_OPERATIONS.clone()),
        Box::new(CREDENTIALS_GENERATED.clone()),
    ]
}
