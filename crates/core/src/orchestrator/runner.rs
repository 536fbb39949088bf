//! Task orchestrator implementation.
//!
//! A task fans out to the generation provider once on creation and once per
//! poll; there is no background driver. Completion is observed lazily when
//! a client queries the task.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::try_join_all;
use rand::seq::SliceRandom;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::admin::AdminSettings;
use crate::casting::CastingQueue;
use crate::code::CodeGenerator;
use crate::compositor::Compositor;
use crate::config::TasksConfig;
use crate::error::KioskError;
use crate::kiosk::Kiosk;
use crate::locks::KeyedLocks;
use crate::metrics::{
    PROVIDER_FANOUT_DURATION, PROVIDER_REQUESTS, TASKS_CREATED, TASK_DURATION, TASK_TRANSITIONS,
};
use crate::printing::{PrintItem, PrintQueue};
use crate::provider::{GenerationProvider, ProviderError, SubTaskRequest, SubTaskResult};
use crate::store::KvStore;
use crate::task::{
    OutputKind, SubTaskRecord, Task, TaskInput, TaskOutput, TaskRepository, TaskStatus, TaskType,
};
use crate::tenant::Tenant;

use super::types::aggregate_status;

/// One planned provider call and the record it will produce.
struct PlannedSubTask {
    request: SubTaskRequest,
    prompt_index: Option<usize>,
}

/// Drives the tasks of one tenant through their lifecycle.
///
/// Cheap to construct; obtain one per request from [`Kiosk::orchestrator`].
pub struct TaskOrchestrator {
    tenant: Tenant,
    store: Arc<dyn KvStore>,
    tasks: TaskRepository,
    codes: CodeGenerator,
    casting: CastingQueue,
    provider: Arc<dyn GenerationProvider>,
    compositor: Arc<dyn Compositor>,
    config: Arc<TasksConfig>,
    admin: AdminSettings,
    max_outstanding_jobs: i64,
    task_locks: Arc<KeyedLocks<tokio::sync::Mutex<()>>>,
}

impl TaskOrchestrator {
    pub(crate) fn new(kiosk: &Kiosk, tenant: &Tenant) -> Self {
        let store = kiosk.tenant_store(tenant);
        Self {
            tenant: tenant.clone(),
            tasks: TaskRepository::new(store.clone()),
            codes: CodeGenerator::new(store.clone(), kiosk.tasks_config()),
            casting: kiosk.casting_queue(tenant),
            store,
            provider: kiosk.provider.clone(),
            compositor: kiosk.compositor.clone(),
            config: kiosk.tasks.clone(),
            admin: kiosk.admin_settings(tenant),
            max_outstanding_jobs: kiosk.printing.max_outstanding_jobs,
            task_locks: kiosk.task_locks.clone(),
        }
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    fn plan(&self, task_type: TaskType, input: &TaskInput) -> Result<Vec<PlannedSubTask>, KioskError> {
        match task_type {
            TaskType::StyledImage => {
                let count = self.config.image_mode.generated_count();
                if self.config.image_prompts.len() < count {
                    return Err(KioskError::Inconsistent(format!(
                        "{} prompts configured, {} needed",
                        self.config.image_prompts.len(),
                        count
                    )));
                }
                Ok(self.config.image_prompts[..count]
                    .iter()
                    .enumerate()
                    .map(|(index, prompt)| PlannedSubTask {
                        request: SubTaskRequest {
                            task_type,
                            image: input.image.clone(),
                            prompt: Some(prompt.clone()),
                            effect_scene: None,
                        },
                        prompt_index: Some(index),
                    })
                    .collect())
            }
            TaskType::VideoEffect => {
                let effect = self
                    .config
                    .video_effects
                    .choose(&mut rand::thread_rng())
                    .ok_or_else(|| {
                        KioskError::Inconsistent("no video effects configured".to_string())
                    })?;
                Ok(vec![PlannedSubTask {
                    request: SubTaskRequest {
                        task_type,
                        image: input.image.clone(),
                        prompt: None,
                        effect_scene: Some(effect.clone()),
                    },
                    prompt_index: None,
                }])
            }
        }
    }

    /// Create a task and submit its sub-tasks to the provider.
    ///
    /// Every sub-task is submitted concurrently. If any submission fails the
    /// task is not persisted and the error is returned.
    pub async fn create_task(&self, task_type: TaskType, input: TaskInput) -> Result<Task, KioskError> {
        if input.image.trim().is_empty() {
            return Err(KioskError::Validation("input image is required".to_string()));
        }
        if !self.admin.get()?.is_online(task_type) {
            return Err(KioskError::ServiceOffline(format!("{} is offline", task_type)));
        }

        let planned = self.plan(task_type, &input)?;
        let code = self.codes.next_code(task_type)?;
        let span = info_span!("create_task", tenant = %self.tenant, task = %code, task_type = %task_type);

        let started = Instant::now();
        let created = try_join_all(planned.iter().map(|p| {
            let provider = self.provider.clone();
            let tenant = self.tenant.clone();
            async move {
                let result = provider.create(&tenant, &p.request).await;
                record_call("create", &result);
                result
            }
        }))
        .instrument(span)
        .await;
        PROVIDER_FANOUT_DURATION
            .with_label_values(&["create"])
            .observe(started.elapsed().as_secs_f64());

        let created = created.map_err(|e| {
            warn!(tenant = %self.tenant, task = %code, error = %e, "Sub-task submission failed");
            KioskError::from(e)
        })?;

        let mut sub_task_ids = Vec::with_capacity(created.len());
        let mut sub_tasks = BTreeMap::new();
        for (plan, created) in planned.into_iter().zip(created) {
            if created.sub_task_id.is_empty() {
                continue;
            }
            sub_task_ids.push(created.sub_task_id.clone());
            sub_tasks.insert(
                created.sub_task_id.clone(),
                SubTaskRecord {
                    sub_task_id: created.sub_task_id,
                    input_image: plan.request.image,
                    prompt_index: plan.prompt_index,
                    prompt: plan.request.prompt,
                    effect_scene: plan.request.effect_scene,
                    output_url: None,
                },
            );
        }

        let expected = match task_type {
            TaskType::StyledImage => self.config.image_mode.generated_count(),
            TaskType::VideoEffect => 1,
        };
        if sub_task_ids.len() != expected {
            return Err(KioskError::Inconsistent(format!(
                "expected {} sub-tasks for {}, provider accepted {}",
                expected,
                code,
                sub_task_ids.len()
            )));
        }

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4().to_string(),
            name: code,
            task_type,
            input,
            sub_task_ids,
            sub_tasks,
            status: TaskStatus::Submitted,
            output: None,
            created_at: now,
            updated_at: now,
            elapsed_secs: 0,
        };
        self.tasks.save(&task)?;

        TASKS_CREATED.with_label_values(&[task_type.as_str()]).inc();
        info!(
            tenant = %self.tenant,
            task = %task.name,
            task_type = %task_type,
            sub_tasks = task.sub_task_ids.len(),
            "Created task"
        );
        Ok(task)
    }

    fn load(&self, task_type: TaskType, name: &str) -> Result<Task, KioskError> {
        self.tasks
            .get_typed(task_type, name)?
            .ok_or_else(|| KioskError::NotFound(format!("{} task {}", task_type, name)))
    }

    /// Current state of a task, refreshed from the provider unless terminal.
    ///
    /// The first query that observes every sub-task succeeded composites the
    /// result and adds it to the casting rotation; concurrent queries of the
    /// same task wait for it and see the stored outcome.
    pub async fn query_task(&self, task_type: TaskType, name: &str) -> Result<Task, KioskError> {
        let stored = self.load(task_type, name)?;
        if stored.status.is_terminal() {
            return Ok(stored);
        }

        let lock_key = format!("{}:task:{}", self.tenant.as_str(), name);
        let result = {
            let lock = self.task_locks.get(&lock_key);
            let _guard = lock.lock().await;
            self.refresh(task_type, name).await
        };
        self.task_locks.release(&lock_key);
        result
    }

    /// Re-query the provider and persist a status change. Runs under the task lock.
    async fn refresh(&self, task_type: TaskType, name: &str) -> Result<Task, KioskError> {
        let stored = self.load(task_type, name)?;
        if stored.status.is_terminal() {
            return Ok(stored);
        }

        let results = self.query_sub_tasks(&stored).await?;
        let statuses: Vec<_> = results.iter().map(|r| r.status).collect();
        let status = aggregate_status(&statuses);

        if status == stored.status {
            debug!(task = %name, status = %status, "Task status unchanged");
            return Ok(stored);
        }
        if !stored.status.can_advance_to(status) {
            warn!(
                task = %name,
                from = %stored.status,
                to = %status,
                "Ignoring backward status change"
            );
            return Ok(stored);
        }

        let mut updated = stored.with_status(status, Utc::now());
        for result in &results {
            if let (Some(record), Some(url)) = (
                updated.sub_tasks.get_mut(&result.sub_task_id),
                result.first_output(),
            ) {
                record.output_url = Some(url.to_string());
            }
        }

        if status == TaskStatus::Succeed {
            updated.output = Some(self.produce_output(&updated).await?);
        }
        if status == TaskStatus::Failed {
            for result in results.iter().filter(|r| r.status_message.is_some()) {
                warn!(
                    task = %name,
                    sub_task = %result.sub_task_id,
                    message = result.status_message.as_deref().unwrap_or_default(),
                    "Sub-task failed"
                );
            }
        }

        // Entry before status: `add_entry` is idempotent, a failed save is retried
        if status == TaskStatus::Succeed {
            self.casting.add_entry(&updated)?;
        }
        self.tasks.save(&updated)?;

        TASK_TRANSITIONS
            .with_label_values(&[task_type.as_str(), &status.to_string()])
            .inc();
        if status.is_terminal() {
            TASK_DURATION
                .with_label_values(&[task_type.as_str(), &status.to_string()])
                .observe(updated.elapsed_secs as f64);
        }
        info!(
            tenant = %self.tenant,
            task = %name,
            from = %stored.status,
            to = %status,
            elapsed_secs = updated.elapsed_secs,
            "Task status changed"
        );
        Ok(updated)
    }

    async fn query_sub_tasks(&self, task: &Task) -> Result<Vec<SubTaskResult>, KioskError> {
        let span = info_span!("query_task", tenant = %self.tenant, task = %task.name);
        let started = Instant::now();
        let results = try_join_all(task.sub_task_ids.iter().map(|id| {
            let provider = self.provider.clone();
            let tenant = self.tenant.clone();
            let task_type = task.task_type;
            async move {
                let result = provider.query(&tenant, task_type, id).await;
                record_call("query", &result);
                result
            }
        }))
        .instrument(span)
        .await;
        PROVIDER_FANOUT_DURATION
            .with_label_values(&["query"])
            .observe(started.elapsed().as_secs_f64());
        Ok(results?)
    }

    /// Final artifact of a task whose sub-tasks all succeeded.
    async fn produce_output(&self, task: &Task) -> Result<TaskOutput, KioskError> {
        let outputs = task
            .sub_task_ids
            .iter()
            .map(|id| {
                task.sub_tasks
                    .get(id)
                    .and_then(|r| r.output_url.clone())
                    .ok_or_else(|| {
                        KioskError::Inconsistent(format!(
                            "sub-task {} of {} succeeded without output",
                            id, task.name
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        match task.task_type {
            TaskType::StyledImage => {
                let tiles = self.config.image_mode.tiles(outputs, &task.input.image);
                let artifact = self.compositor.compose(&task.name, &tiles).await?;
                Ok(TaskOutput {
                    kind: OutputKind::Image,
                    url: artifact.url,
                    thumbnail_url: artifact.thumbnail_url,
                })
            }
            TaskType::VideoEffect => {
                let url = outputs.into_iter().next().ok_or_else(|| {
                    KioskError::Inconsistent(format!("{} has no video output", task.name))
                })?;
                let thumbnail_url = self
                    .compositor
                    .thumbnail(&url, self.config.thumbnail_width, self.config.thumbnail_height)
                    .await?;
                Ok(TaskOutput {
                    kind: OutputKind::Video,
                    url,
                    thumbnail_url,
                })
            }
        }
    }

    /// Enqueue a finished task for printing.
    pub fn print_task(
        &self,
        task_type: TaskType,
        name: &str,
        allow_duplicate: bool,
    ) -> Result<PrintItem, KioskError> {
        if !task_type.is_printable() {
            return Err(KioskError::Validation(format!("{} cannot be printed", task_type)));
        }
        let admin = self.admin.get()?;
        if !admin.allow_print {
            return Err(KioskError::ServiceOffline("printing is disabled".to_string()));
        }
        let task = self.load(task_type, name)?;
        if task.status != TaskStatus::Succeed {
            return Err(KioskError::Validation(format!(
                "task {} is {}, only finished tasks can be printed",
                name, task.status
            )));
        }

        PrintQueue::new(self.store.clone(), task_type, self.max_outstanding_jobs)
            .add_task(&task, allow_duplicate)
    }
}

fn record_call<T>(operation: &str, result: &Result<T, ProviderError>) {
    let outcome = if result.is_ok() { "success" } else { "error" };
    PROVIDER_REQUESTS
        .with_label_values(&[operation, outcome])
        .inc();
}
