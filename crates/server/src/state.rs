use sha2::{Digest, Sha256};
use std::sync::Arc;

use kiosk_core::{
    AccessTokenSigner, Authenticator, Config, CredentialCache, Kiosk, SanitizedConfig,
};

/// Shared application state
pub struct AppState {
    config: Config,
    config_hash: String,
    authenticator: Arc<dyn Authenticator>,
    kiosk: Arc<Kiosk>,
    access_tokens: Arc<CredentialCache<AccessTokenSigner>>,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        kiosk: Arc<Kiosk>,
        access_tokens: Arc<CredentialCache<AccessTokenSigner>>,
    ) -> Self {
        let config_hash = config_hash(&config);
        Self {
            config,
            config_hash,
            authenticator,
            kiosk,
            access_tokens,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// Short SHA-256 of the loaded configuration.
    pub fn config_hash(&self) -> &str {
        &self.config_hash
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn kiosk(&self) -> &Kiosk {
        &self.kiosk
    }

    pub fn access_tokens(&self) -> &CredentialCache<AccessTokenSigner> {
        &self.access_tokens
    }
}

/// First 16 hex digits of the SHA-256 of the serialized config.
pub fn config_hash(config: &Config) -> String {
    let config_json = serde_json::to_string(config).unwrap_or_default();
    let digest = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    digest[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_core::load_config_from_str;

    #[test]
    fn test_config_hash_changes_with_config() {
        let a = load_config_from_str("[auth]\nmethod = \"none\"\n").unwrap();
        let b = load_config_from_str("[auth]\nmethod = \"none\"\n[server]\nport = 9090\n").unwrap();

        assert_eq!(config_hash(&a).len(), 16);
        assert_eq!(config_hash(&a), config_hash(&a.clone()));
        assert_ne!(config_hash(&a), config_hash(&b));
    }
}
