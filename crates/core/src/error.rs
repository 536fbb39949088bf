//! Error taxonomy shared by the orchestration and queueing components.

use thiserror::Error;

use crate::compositor::CompositorError;
use crate::credential::CredentialError;
use crate::provider::ProviderError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum KioskError {
    /// Bad input: unknown type, missing image, invalid action, bad paging.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The operation was already performed, e.g. a second print request.
    #[error("Duplicate operation: {0}")]
    DuplicateOperation(String),

    /// The task type is switched off for this deployment.
    #[error("Service offline: {0}")]
    ServiceOffline(String),

    /// The provider reported a business failure.
    #[error("Provider error {code}: {message}")]
    Provider {
        code: i64,
        message: String,
        payload: serde_json::Value,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Network or timeout failure; retrying may succeed.
    #[error("Transient I/O failure: {0}")]
    TransientIo(String),

    /// An internal invariant did not hold.
    #[error("Inconsistent state: {0}")]
    Inconsistent(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl From<ProviderError> for KioskError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Api {
                code,
                message,
                payload,
            } => KioskError::Provider {
                code,
                message,
                payload,
            },
            ProviderError::Timeout | ProviderError::Transport(_) => {
                KioskError::TransientIo(e.to_string())
            }
            ProviderError::InvalidResponse(msg) => KioskError::Inconsistent(msg),
            ProviderError::Credential(msg) => KioskError::TransientIo(msg),
        }
    }
}

impl From<CompositorError> for KioskError {
    fn from(e: CompositorError) -> Self {
        match e {
            CompositorError::NoInputs => KioskError::Inconsistent(e.to_string()),
            CompositorError::Failed(msg) => KioskError::TransientIo(msg),
        }
    }
}
