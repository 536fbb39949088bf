//! Types for the task orchestrator.

use serde::{Deserialize, Serialize};

use crate::provider::SubTaskStatus;
use crate::task::TaskStatus;

/// Layout of a stylized image task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageMode {
    /// Nine generated tiles.
    #[default]
    AllGenerated,
    /// Eight generated tiles around the submitted photo.
    WithOrigin,
    /// Nine generated tiles; the compositor keeps the center tile fixed.
    AllGeneratedFixedCenter,
}

impl ImageMode {
    /// Number of provider sub-tasks an image task fans out to.
    pub fn generated_count(&self) -> usize {
        match self {
            ImageMode::AllGenerated | ImageMode::AllGeneratedFixedCenter => 9,
            ImageMode::WithOrigin => 8,
        }
    }

    /// Tiles handed to the compositor, in layout order.
    ///
    /// In [`ImageMode::WithOrigin`] the submitted photo is placed in the
    /// middle of the generated tiles.
    pub fn tiles(&self, generated: Vec<String>, origin: &str) -> Vec<String> {
        let mut tiles = generated;
        if *self == ImageMode::WithOrigin {
            let middle = tiles.len() / 2;
            tiles.insert(middle, origin.to_string());
        }
        tiles
    }
}

/// Overall task status from the statuses of its sub-tasks.
///
/// Precedence: all submitted, then all succeeded, then any failed; anything
/// else is still processing.
pub fn aggregate_status(statuses: &[SubTaskStatus]) -> TaskStatus {
    let all = |wanted: SubTaskStatus| statuses.iter().all(|s| *s == wanted);

    if all(SubTaskStatus::Submitted) {
        TaskStatus::Submitted
    } else if all(SubTaskStatus::Succeed) {
        TaskStatus::Succeed
    } else if statuses.contains(&SubTaskStatus::Failed) {
        TaskStatus::Failed
    } else {
        TaskStatus::Processing
    }
}
