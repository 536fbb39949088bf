pub mod admin;
pub mod auth;
pub mod casting;
pub mod code;
pub mod compositor;
pub mod config;
pub mod credential;
pub mod error;
pub mod kiosk;
pub mod locks;
pub mod metrics;
pub mod orchestrator;
pub mod printing;
pub mod provider;
pub mod store;
pub mod task;
pub mod tenant;
pub mod testing;

pub use admin::{AdminConfig, AdminConfigUpdate, AdminSettings};
pub use auth::{
    create_authenticator, token_from_headers, AuthError, AuthRequest, Authenticator, Identity,
    ManagementTokenAuthenticator, NoneAuthenticator,
};
pub use casting::{CastingAction, CastingEntry, CastingListQuery, CastingPage, CastingQueue};
pub use code::CodeGenerator;
pub use compositor::{ComposedArtifact, Compositor, CompositorError, PassthroughCompositor};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthMethod, Config, ConfigError,
    SanitizedConfig,
};
pub use credential::{AccessTokenSigner, Credential, CredentialCache, CredentialError, JwtSigner};
pub use error::KioskError;
pub use kiosk::Kiosk;
pub use orchestrator::{ImageMode, TaskOrchestrator};
pub use printing::{PrintDispatcher, PrintItem, PrintQueue, PrinterDriver, PrinterEvent, PrintingStatus};
pub use provider::{GenerationProvider, HttpGenerationProvider, ProviderError};
pub use store::{KvStore, NamespacedStore, SqliteKvStore, StoreError};
pub use task::{Task, TaskInput, TaskStatus, TaskType};
pub use tenant::Tenant;
