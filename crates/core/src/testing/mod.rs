//! Testing utilities and mock implementations for E2E tests.
//!
//! This module provides mock implementations of every external collaborator
//! trait, so the orchestrator and queues can be exercised without a provider
//! account, an image pipeline or a printer.
//!
//! # Example
//!
//! ```rust,ignore
//! use kiosk_core::testing::{MockCompositor, MockGenerationProvider};
//!
//! let provider = Arc::new(MockGenerationProvider::new());
//! let compositor = Arc::new(MockCompositor::new());
//! let kiosk = Kiosk::new(store, provider.clone(), compositor, tasks, printing);
//!
//! // Let every sub-task finish
//! provider.set_all_status(SubTaskStatus::Succeed).await;
//! ```

mod failing_store;
mod mock_compositor;
mod mock_printer;
mod mock_provider;

pub use failing_store::FailingStore;
pub use mock_compositor::{MockCompositor, RecordedComposition};
pub use mock_printer::{MockPrinterDriver, RecordedPrintJob};
pub use mock_provider::{MockGenerationProvider, RecordedCreate};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use crate::printing::{PrintItem, PrintingStatus};
    use crate::task::{
        OutputKind, SubTaskRecord, Task, TaskInput, TaskOutput, TaskStatus, TaskType,
    };

    /// A finished task of `task_type` named `code` with one sub-task.
    pub fn succeeded_task(task_type: TaskType, code: &str) -> Task {
        let now = Utc::now();
        let sub_task_id = format!("sub-{}", code);
        let (kind, url) = match task_type {
            TaskType::StyledImage => (OutputKind::Image, format!("https://cdn.example/{}.jpg", code)),
            TaskType::VideoEffect => (OutputKind::Video, format!("https://cdn.example/{}.mp4", code)),
        };

        let mut sub_tasks = BTreeMap::new();
        sub_tasks.insert(
            sub_task_id.clone(),
            SubTaskRecord {
                sub_task_id: sub_task_id.clone(),
                input_image: "https://uploads.example/input.jpg".to_string(),
                prompt_index: None,
                prompt: None,
                effect_scene: None,
                output_url: Some(url.clone()),
            },
        );

        Task {
            id: format!("id-{}", code),
            name: code.to_string(),
            task_type,
            input: TaskInput {
                image: "https://uploads.example/input.jpg".to_string(),
            },
            sub_task_ids: vec![sub_task_id],
            sub_tasks,
            status: TaskStatus::Succeed,
            output: Some(TaskOutput {
                kind,
                thumbnail_url: format!("{}?thumb", url),
                url,
            }),
            created_at: now,
            updated_at: now,
            elapsed_secs: 30,
        }
    }

    /// A finished stylized image task; its output is `https://cdn.example/<code>.jpg`.
    pub fn succeeded_image_task(code: &str) -> Task {
        succeeded_task(TaskType::StyledImage, code)
    }

    /// A finished video effect task.
    pub fn succeeded_video_task(code: &str) -> Task {
        succeeded_task(TaskType::VideoEffect, code)
    }

    /// A READY print item named `name` (`printing:<code>`).
    pub fn print_item(name: &str) -> PrintItem {
        let code = name.strip_prefix("printing:").unwrap_or(name);
        let now = Utc::now();
        PrintItem {
            id: format!("print-{}", code),
            name: name.to_string(),
            task: succeeded_image_task(code),
            status: PrintingStatus::Ready,
            created_at: now,
            updated_at: now,
            ahead: None,
        }
    }
}
