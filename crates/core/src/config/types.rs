use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;

use crate::orchestrator::ImageMode;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub tasks: TasksConfig,
    #[serde(default)]
    pub printing: PrintingConfig,
    #[serde(default)]
    pub credential: CredentialConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// Management token accepted for every tenant (required for `token` method).
    #[serde(default)]
    pub management_token: Option<String>,
    /// Per-tenant management tokens; take precedence over `management_token`.
    #[serde(default)]
    pub tenant_tokens: HashMap<String, String>,
    /// Whether task creation requires a valid access token.
    #[serde(default = "default_true")]
    pub require_access_token: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Management endpoints are open.
    None,
    /// Management endpoints require `Authorization: Token <token>`.
    Token,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("kiosk.db")
}

/// Generation provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Provider API base URL
    #[serde(default = "default_provider_url")]
    pub base_url: String,
    /// Access key used as the JWT issuer
    #[serde(default)]
    pub access_key: String,
    /// Secret used to sign provider JWTs
    #[serde(default)]
    pub secret_key: String,
    /// Per-tenant key pairs overriding the defaults above
    #[serde(default)]
    pub tenant_keys: HashMap<String, ProviderKeys>,
    /// Model used for stylized images
    #[serde(default = "default_image_model")]
    pub image_model: String,
    /// Request timeout in seconds
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_url(),
            access_key: String::new(),
            secret_key: String::new(),
            tenant_keys: HashMap::new(),
            image_model: default_image_model(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

impl ProviderConfig {
    /// Key pair for `tenant`, falling back to the default pair.
    pub fn keys_for(&self, tenant: &str) -> ProviderKeys {
        self.tenant_keys
            .get(tenant)
            .cloned()
            .unwrap_or_else(|| ProviderKeys {
                access_key: self.access_key.clone(),
                secret_key: self.secret_key.clone(),
            })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderKeys {
    pub access_key: String,
    pub secret_key: String,
}

fn default_provider_url() -> String {
    "https://api.klingai.com".to_string()
}

fn default_image_model() -> String {
    "kling-v1-5".to_string()
}

fn default_provider_timeout() -> u64 {
    30
}

/// Task creation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TasksConfig {
    /// Layout of stylized image tasks
    #[serde(default)]
    pub image_mode: ImageMode,
    /// Style prompts, one per generated tile (index = prompt index)
    #[serde(default = "default_image_prompts")]
    pub image_prompts: Vec<String>,
    /// Effect scenes a video task picks from at random
    #[serde(default = "default_video_effects")]
    pub video_effects: Vec<String>,
    /// Whether stylized image tasks are accepted
    #[serde(default = "default_true")]
    pub image_online: bool,
    /// Whether video effect tasks are accepted
    #[serde(default = "default_true")]
    pub video_online: bool,
    /// Counter base for stylized image codes
    #[serde(default = "default_image_code_base")]
    pub image_code_base: i64,
    /// Counter base for video effect codes
    #[serde(default = "default_video_code_base")]
    pub video_code_base: i64,
    /// Prefix of every task code
    #[serde(default = "default_code_prefix")]
    pub code_prefix: String,
    /// Thumbnail size for video results
    #[serde(default = "default_thumbnail_width")]
    pub thumbnail_width: u32,
    #[serde(default = "default_thumbnail_height")]
    pub thumbnail_height: u32,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            image_mode: ImageMode::default(),
            image_prompts: default_image_prompts(),
            video_effects: default_video_effects(),
            image_online: true,
            video_online: true,
            image_code_base: default_image_code_base(),
            video_code_base: default_video_code_base(),
            code_prefix: default_code_prefix(),
            thumbnail_width: default_thumbnail_width(),
            thumbnail_height: default_thumbnail_height(),
        }
    }
}

fn default_image_prompts() -> Vec<String> {
    [
        "watercolor portrait, soft pastel palette",
        "classic oil painting portrait, dramatic lighting",
        "anime style portrait, vibrant colors",
        "pixel art portrait, 16-bit",
        "pencil sketch portrait, fine cross hatching",
        "pop art portrait, bold halftone dots",
        "cyberpunk portrait, neon rim light",
        "clay figurine portrait, studio lighting",
        "ukiyo-e woodblock print portrait",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_video_effects() -> Vec<String> {
    ["bloombloom", "dizzydizzy", "fuzzyfuzzy", "squish", "expansion"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_image_code_base() -> i64 {
    1000
}

fn default_video_code_base() -> i64 {
    5000
}

fn default_code_prefix() -> String {
    "No.".to_string()
}

fn default_thumbnail_width() -> u32 {
    225
}

fn default_thumbnail_height() -> u32 {
    400
}

/// Print queue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PrintingConfig {
    /// Admission limit on jobs outstanding at the printer
    #[serde(default = "default_max_outstanding_jobs")]
    pub max_outstanding_jobs: i64,
    /// Whether finished tasks may be sent to the printer
    #[serde(default = "default_true")]
    pub allow_print: bool,
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
}

impl Default for PrintingConfig {
    fn default() -> Self {
        Self {
            max_outstanding_jobs: default_max_outstanding_jobs(),
            allow_print: true,
            dispatcher: DispatcherConfig::default(),
        }
    }
}

fn default_max_outstanding_jobs() -> i64 {
    10
}

/// Printer dispatcher configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Items combined into one printer job
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_batch_size() -> usize {
    1
}

/// Credential lifetimes
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialConfig {
    /// Lifetime of provider JWTs
    #[serde(default = "default_jwt_validity_secs")]
    pub jwt_validity_secs: u64,
    /// How long before expiry a JWT is regenerated
    #[serde(default = "default_refresh_margin_secs")]
    pub jwt_refresh_margin_secs: u64,
    /// Clock-skew allowance applied to the JWT `nbf` claim
    #[serde(default = "default_not_before_skew_secs")]
    pub jwt_not_before_skew_secs: u64,
    /// Lifetime of kiosk access tokens
    #[serde(default = "default_access_token_validity_secs")]
    pub access_token_validity_secs: u64,
    /// How long before expiry an access token is regenerated
    #[serde(default = "default_refresh_margin_secs")]
    pub access_token_refresh_margin_secs: u64,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            jwt_validity_secs: default_jwt_validity_secs(),
            jwt_refresh_margin_secs: default_refresh_margin_secs(),
            jwt_not_before_skew_secs: default_not_before_skew_secs(),
            access_token_validity_secs: default_access_token_validity_secs(),
            access_token_refresh_margin_secs: default_refresh_margin_secs(),
        }
    }
}

fn default_jwt_validity_secs() -> u64 {
    1800
}

fn default_refresh_margin_secs() -> u64 {
    10
}

fn default_not_before_skew_secs() -> u64 {
    5
}

fn default_access_token_validity_secs() -> u64 {
    5 * 60 * 60
}

fn default_true() -> bool {
    true
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub provider: SanitizedProviderConfig,
    pub tasks: TasksConfig,
    pub printing: PrintingConfig,
    pub credential: CredentialConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub management_token_configured: bool,
    pub tenant_token_count: usize,
    pub require_access_token: bool,
}

/// Sanitized provider config (keys hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedProviderConfig {
    pub base_url: String,
    pub keys_configured: bool,
    pub tenants_with_keys: Vec<String>,
    pub image_model: String,
    pub timeout_secs: u64,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let mut tenants_with_keys: Vec<String> =
            config.provider.tenant_keys.keys().cloned().collect();
        tenants_with_keys.sort();

        Self {
            auth: SanitizedAuthConfig {
                method: match config.auth.method {
                    AuthMethod::None => "none".to_string(),
                    AuthMethod::Token => "token".to_string(),
                },
                management_token_configured: config.auth.management_token.is_some(),
                tenant_token_count: config.auth.tenant_tokens.len(),
                require_access_token: config.auth.require_access_token,
            },
            server: config.server.clone(),
            database: config.database.clone(),
            provider: SanitizedProviderConfig {
                base_url: config.provider.base_url.clone(),
                keys_configured: !config.provider.access_key.is_empty()
                    && !config.provider.secret_key.is_empty(),
                tenants_with_keys,
                image_model: config.provider.image_model.clone(),
                timeout_secs: config.provider.timeout_secs,
            },
            tasks: config.tasks.clone(),
            printing: config.printing.clone(),
            credential: config.credential.clone(),
        }
    }
}
