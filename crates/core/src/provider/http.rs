//! HTTP client for a Kling-style generation API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    GenerationProvider, ProviderError, SubTaskCreated, SubTaskRequest, SubTaskResult,
    SubTaskStatus,
};
use crate::config::ProviderConfig;
use crate::credential::{CredentialCache, JwtSigner};
use crate::task::TaskType;
use crate::tenant::Tenant;

const VIDEO_MODEL: &str = "kling-v1-6";
const VIDEO_DURATION: &str = "5";
const IMAGE_ASPECT_RATIO: &str = "9:16";

/// Response envelope shared by every endpoint.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<TaskData>,
}

#[derive(Debug, Deserialize)]
struct TaskData {
    task_id: String,
    task_status: SubTaskStatus,
    #[serde(default)]
    task_status_msg: Option<String>,
    #[serde(default)]
    task_result: Option<TaskResultData>,
}

#[derive(Debug, Default, Deserialize)]
struct TaskResultData {
    #[serde(default)]
    images: Vec<MediaItem>,
    #[serde(default)]
    videos: Vec<MediaItem>,
}

#[derive(Debug, Deserialize)]
struct MediaItem {
    url: String,
}

#[derive(Debug, Serialize)]
struct ImageGenerationBody<'a> {
    model_name: &'a str,
    prompt: &'a str,
    image: &'a str,
    n: u32,
    aspect_ratio: &'a str,
}

#[derive(Debug, Serialize)]
struct VideoEffectBody<'a> {
    effect_scene: &'a str,
    input: VideoEffectInput<'a>,
}

#[derive(Debug, Serialize)]
struct VideoEffectInput<'a> {
    model_name: &'a str,
    image: &'a str,
    duration: &'a str,
}

/// Provider backed by the Kling open API.
///
/// Every request carries a `Bearer` JWT taken from the shared credential
/// cache for the calling tenant.
pub struct HttpGenerationProvider {
    client: Client,
    base_url: String,
    image_model: String,
    credentials: Arc<CredentialCache<JwtSigner>>,
}

impl HttpGenerationProvider {
    pub fn new(
        config: &ProviderConfig,
        credentials: Arc<CredentialCache<JwtSigner>>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            image_model: config.image_model.clone(),
            credentials,
        })
    }

    fn endpoint(&self, task_type: TaskType) -> String {
        match task_type {
            TaskType::StyledImage => format!("{}/v1/images/generations", self.base_url),
            TaskType::VideoEffect => format!("{}/v1/videos/effects", self.base_url),
        }
    }

    async fn bearer(&self, tenant: &Tenant) -> Result<String, ProviderError> {
        let credential = self
            .credentials
            .get_latest(tenant)
            .await
            .map_err(|e| ProviderError::Credential(e.to_string()))?;
        Ok(format!("Bearer {}", credential.value))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<TaskData, ProviderError> {
        let response = request.send().await.map_err(transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        interpret_response(status, &body)
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Transport(e.to_string())
    }
}

/// Whether a failed HTTP exchange is worth retrying as is.
fn is_transient(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}

/// Map an HTTP status and body to the provider's task data.
///
/// Bodies that are not the provider envelope (gateway error pages, truncated
/// responses) are transient failures when the status is, so callers retry.
fn interpret_response(status: StatusCode, body: &str) -> Result<TaskData, ProviderError> {
    let unexpected = |detail: String| {
        if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
            ProviderError::Timeout
        } else if is_transient(status) {
            ProviderError::Transport(format!("HTTP {}: {}", status, detail))
        } else {
            ProviderError::InvalidResponse(format!("HTTP {}: {}", status, detail))
        }
    };

    let payload: serde_json::Value =
        serde_json::from_str(body).map_err(|e| unexpected(e.to_string()))?;
    let envelope: Envelope =
        serde_json::from_value(payload.clone()).map_err(|e| unexpected(e.to_string()))?;

    if envelope.code != 0 || !status.is_success() {
        warn!(code = envelope.code, status = %status, message = %envelope.message, "Provider rejected request");
        return Err(ProviderError::Api {
            code: if envelope.code != 0 {
                envelope.code
            } else {
                i64::from(status.as_u16())
            },
            message: envelope.message,
            payload,
        });
    }

    envelope
        .data
        .ok_or_else(|| ProviderError::InvalidResponse("missing data".to_string()))
}

/// Strip a `data:<mime>;base64,` prefix; the provider expects bare base64 or a URL.
fn normalize_image(image: &str) -> &str {
    if image.starts_with("data:") {
        if let Some((_, data)) = image.split_once(',') {
            return data;
        }
    }
    image
}

#[async_trait]
impl GenerationProvider for HttpGenerationProvider {
    fn name(&self) -> &str {
        "kling"
    }

    async fn create(
        &self,
        tenant: &Tenant,
        request: &SubTaskRequest,
    ) -> Result<SubTaskCreated, ProviderError> {
        let image = normalize_image(&request.image);
        let builder = self
            .client
            .post(self.endpoint(request.task_type))
            .header("Authorization", self.bearer(tenant).await?);

        let builder = match request.task_type {
            TaskType::StyledImage => builder.json(&ImageGenerationBody {
                model_name: &self.image_model,
                prompt: request.prompt.as_deref().unwrap_or_default(),
                image,
                n: 1,
                aspect_ratio: IMAGE_ASPECT_RATIO,
            }),
            TaskType::VideoEffect => {
                let effect_scene = request.effect_scene.as_deref().ok_or_else(|| {
                    ProviderError::InvalidResponse("video request without effect scene".to_string())
                })?;
                builder.json(&VideoEffectBody {
                    effect_scene,
                    input: VideoEffectInput {
                        model_name: VIDEO_MODEL,
                        image,
                        duration: VIDEO_DURATION,
                    },
                })
            }
        };

        let data = self.send(builder).await?;
        debug!(task_type = %request.task_type, sub_task_id = %data.task_id, "Created sub-task");

        Ok(SubTaskCreated {
            sub_task_id: data.task_id,
            status: data.task_status,
        })
    }

    async fn query(
        &self,
        tenant: &Tenant,
        task_type: TaskType,
        sub_task_id: &str,
    ) -> Result<SubTaskResult, ProviderError> {
        let url = format!("{}/{}", self.endpoint(task_type), sub_task_id);
        let builder = self
            .client
            .get(url)
            .header("Authorization", self.bearer(tenant).await?);

        let data = self.send(builder).await?;
        let result = data.task_result.unwrap_or_default();

        Ok(SubTaskResult {
            sub_task_id: data.task_id,
            status: data.task_status,
            status_message: data.task_status_msg,
            images: result.images.into_iter().map(|m| m.url).collect(),
            videos: result.videos.into_iter().map(|m| m.url).collect(),
        })
    }
}
