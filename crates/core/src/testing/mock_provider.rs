//! Mock generation provider for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::provider::{
    GenerationProvider, ProviderError, SubTaskCreated, SubTaskRequest, SubTaskResult,
    SubTaskStatus,
};
use crate::task::TaskType;
use crate::tenant::Tenant;

/// A recorded sub-task creation for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedCreate {
    pub tenant: Tenant,
    pub request: SubTaskRequest,
    pub sub_task_id: String,
}

#[derive(Debug, Clone)]
struct MockSubTask {
    task_type: TaskType,
    status: SubTaskStatus,
}

/// Mock implementation of the GenerationProvider trait.
///
/// Sub-tasks start out `submitted`; tests move them along with
/// [`set_status`](Self::set_status) or [`set_all_status`](Self::set_all_status).
/// Succeeded sub-tasks report `https://provider.example/<id>.png` (or `.mp4`
/// for videos) as their output.
///
/// # Example
///
/// ```rust,ignore
/// let provider = MockGenerationProvider::new();
/// let created = provider.create(&tenant, &request).await?;
///
/// provider.set_all_status(SubTaskStatus::Succeed).await;
/// let result = provider.query(&tenant, TaskType::StyledImage, &created.sub_task_id).await?;
/// assert_eq!(result.status, SubTaskStatus::Succeed);
/// ```
#[derive(Debug)]
pub struct MockGenerationProvider {
    created: Arc<RwLock<Vec<RecordedCreate>>>,
    sub_tasks: Arc<RwLock<HashMap<String, MockSubTask>>>,
    /// If set, the next create or query call fails with this error.
    next_error: Arc<RwLock<Option<ProviderError>>>,
    /// When true, created sub-tasks come back without an id.
    drop_ids: Arc<RwLock<bool>>,
    queries: Arc<RwLock<usize>>,
    counter: Arc<RwLock<u32>>,
}

impl Default for MockGenerationProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGenerationProvider {
    pub fn new() -> Self {
        Self {
            created: Arc::new(RwLock::new(Vec::new())),
            sub_tasks: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            drop_ids: Arc::new(RwLock::new(false)),
            queries: Arc::new(RwLock::new(0)),
            counter: Arc::new(RwLock::new(0)),
        }
    }

    /// Requests received by `create`, in arrival order.
    pub async fn created_requests(&self) -> Vec<SubTaskRequest> {
        self.created
            .read()
            .await
            .iter()
            .map(|r| r.request.clone())
            .collect()
    }

    /// Full records of every `create` call.
    pub async fn recorded_creates(&self) -> Vec<RecordedCreate> {
        self.created.read().await.clone()
    }

    /// Number of `query` calls served.
    pub async fn query_count(&self) -> usize {
        *self.queries.read().await
    }

    /// Set the status of one sub-task.
    pub async fn set_status(&self, sub_task_id: &str, status: SubTaskStatus) {
        if let Some(sub_task) = self.sub_tasks.write().await.get_mut(sub_task_id) {
            sub_task.status = status;
        }
    }

    /// Set the status of every known sub-task.
    pub async fn set_all_status(&self, status: SubTaskStatus) {
        for sub_task in self.sub_tasks.write().await.values_mut() {
            sub_task.status = status;
        }
    }

    /// Configure the next call to fail with the given error.
    pub async fn set_next_error(&self, error: ProviderError) {
        *self.next_error.write().await = Some(error);
    }

    /// Make `create` answer without sub-task ids.
    pub async fn set_drop_ids(&self, drop: bool) {
        *self.drop_ids.write().await = drop;
    }

    async fn take_error(&self) -> Result<(), ProviderError> {
        match self.next_error.write().await.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn output_url(task_type: TaskType, sub_task_id: &str) -> String {
        let extension = match task_type {
            TaskType::StyledImage => "png",
            TaskType::VideoEffect => "mp4",
        };
        format!("https://provider.example/{}.{}", sub_task_id, extension)
    }
}

#[async_trait]
impl GenerationProvider for MockGenerationProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create(
        &self,
        tenant: &Tenant,
        request: &SubTaskRequest,
    ) -> Result<SubTaskCreated, ProviderError> {
        self.take_error().await?;

        let sub_task_id = {
            let mut counter = self.counter.write().await;
            *counter += 1;
            format!("mock-sub-{}", *counter)
        };
        self.sub_tasks.write().await.insert(
            sub_task_id.clone(),
            MockSubTask {
                task_type: request.task_type,
                status: SubTaskStatus::Submitted,
            },
        );
        self.created.write().await.push(RecordedCreate {
            tenant: tenant.clone(),
            request: request.clone(),
            sub_task_id: sub_task_id.clone(),
        });

        let sub_task_id = if *self.drop_ids.read().await {
            String::new()
        } else {
            sub_task_id
        };
        Ok(SubTaskCreated {
            sub_task_id,
            status: SubTaskStatus::Submitted,
        })
    }

    async fn query(
        &self,
        _tenant: &Tenant,
        task_type: TaskType,
        sub_task_id: &str,
    ) -> Result<SubTaskResult, ProviderError> {
        self.take_error().await?;
        *self.queries.write().await += 1;

        let sub_task = self
            .sub_tasks
            .read()
            .await
            .get(sub_task_id)
            .cloned()
            .ok_or_else(|| ProviderError::Api {
                code: 1201,
                message: format!("task {} not found", sub_task_id),
                payload: serde_json::json!({"code": 1201}),
            })?;

        let mut result = SubTaskResult {
            sub_task_id: sub_task_id.to_string(),
            status: sub_task.status,
            status_message: None,
            images: Vec::new(),
            videos: Vec::new(),
        };
        match sub_task.status {
            SubTaskStatus::Succeed => {
                let url = Self::output_url(sub_task.task_type, sub_task_id);
                match task_type {
                    TaskType::StyledImage => result.images.push(url),
                    TaskType::VideoEffect => result.videos.push(url),
                }
            }
            SubTaskStatus::Failed => {
                result.status_message = Some("generation failed".to_string());
            }
            _ => {}
        }
        Ok(result)
    }
}
