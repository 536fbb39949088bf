//! External asynchronous generation provider.
//!
//! The provider accepts one sub-task per call and reports its progress on
//! request. A task fans out into several sub-tasks; the orchestrator owns the
//! aggregation.

mod http;

pub use http::HttpGenerationProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::task::TaskType;
use crate::tenant::Tenant;

/// Errors from a generation provider.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The provider answered with a business error; `payload` is its raw response.
    #[error("Provider error {code}: {message}")]
    Api {
        code: i64,
        message: String,
        payload: serde_json::Value,
    },

    #[error("Provider request timed out")]
    Timeout,

    #[error("Provider unreachable: {0}")]
    Transport(String),

    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),

    #[error("No provider credential: {0}")]
    Credential(String),
}

/// Provider-side state of one sub-task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubTaskStatus {
    Submitted,
    Processing,
    Succeed,
    Failed,
}

/// Input for one sub-task.
#[derive(Debug, Clone, PartialEq)]
pub struct SubTaskRequest {
    pub task_type: TaskType,
    /// Photo reference (URL or base64 data).
    pub image: String,
    /// Style prompt for image sub-tasks.
    pub prompt: Option<String>,
    /// Effect scene for video sub-tasks.
    pub effect_scene: Option<String>,
}

/// Acknowledgement of a created sub-task.
#[derive(Debug, Clone, PartialEq)]
pub struct SubTaskCreated {
    pub sub_task_id: String,
    pub status: SubTaskStatus,
}

/// Current state of a sub-task.
#[derive(Debug, Clone, PartialEq)]
pub struct SubTaskResult {
    pub sub_task_id: String,
    pub status: SubTaskStatus,
    pub status_message: Option<String>,
    pub images: Vec<String>,
    pub videos: Vec<String>,
}

impl SubTaskResult {
    /// First produced artifact, if any.
    pub fn first_output(&self) -> Option<&str> {
        self.images
            .first()
            .or_else(|| self.videos.first())
            .map(String::as_str)
    }
}

/// An external provider that runs generation sub-tasks asynchronously.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Name of this provider (for logging).
    fn name(&self) -> &str;

    /// Start one sub-task.
    async fn create(
        &self,
        tenant: &Tenant,
        request: &SubTaskRequest,
    ) -> Result<SubTaskCreated, ProviderError>;

    /// Fetch the current state of a sub-task.
    async fn query(
        &self,
        tenant: &Tenant,
        task_type: TaskType,
        sub_task_id: &str,
    ) -> Result<SubTaskResult, ProviderError>;
}
