//! Task data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    StyledImage,
    VideoEffect,
}

impl TaskType {
    pub const ALL: [TaskType; 2] = [TaskType::StyledImage, TaskType::VideoEffect];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::StyledImage => "STYLED_IMAGE",
            TaskType::VideoEffect => "VIDEO_EFFECT",
        }
    }

    /// Whether finished tasks of this type can be printed.
    pub fn is_printable(&self) -> bool {
        matches!(self, TaskType::StyledImage)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STYLED_IMAGE" => Ok(TaskType::StyledImage),
            "VIDEO_EFFECT" => Ok(TaskType::VideoEffect),
            other => Err(format!("unknown task type: {}", other)),
        }
    }
}

/// Aggregate lifecycle state of a task.
///
/// Transitions only move forward: SUBMITTED -> PROCESSING -> SUCCEED | FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Submitted,
    Processing,
    Succeed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeed | TaskStatus::Failed)
    }

    /// Position in the lifecycle; terminal states share the last position.
    pub fn stage(&self) -> u8 {
        match self {
            TaskStatus::Submitted => 0,
            TaskStatus::Processing => 1,
            TaskStatus::Succeed | TaskStatus::Failed => 2,
        }
    }

    /// Whether moving from `self` to `next` is allowed.
    pub fn can_advance_to(&self, next: TaskStatus) -> bool {
        !self.is_terminal() && next.stage() >= self.stage()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Submitted => "SUBMITTED",
            TaskStatus::Processing => "PROCESSING",
            TaskStatus::Succeed => "SUCCEED",
            TaskStatus::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// User input for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInput {
    /// Reference (URL or base64 data) to the uploaded photo.
    pub image: String,
}

/// Record of one provider sub-task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTaskRecord {
    pub sub_task_id: String,
    pub input_image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect_scene: Option<String>,
    /// First output URL, filled in once the sub-task succeeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutputKind {
    Image,
    Video,
}

/// Final artifact of a succeeded task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutput {
    pub kind: OutputKind,
    pub url: String,
    pub thumbnail_url: String,
}

/// A user-visible generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    /// Human-readable code, e.g. `No.1024`. Unique per tenant.
    pub name: String,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    pub input: TaskInput,
    /// Provider sub-task ids in fan-out order.
    pub sub_task_ids: Vec<String>,
    pub sub_tasks: BTreeMap<String, SubTaskRecord>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<TaskOutput>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub elapsed_secs: i64,
}

impl Task {
    /// Copy of this task with a new status and refreshed timestamps.
    pub fn with_status(&self, status: TaskStatus, now: DateTime<Utc>) -> Task {
        Task {
            status,
            updated_at: now,
            elapsed_secs: (now - self.created_at).num_seconds().max(0),
            ..self.clone()
        }
    }
}
