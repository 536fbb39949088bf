use super::{
    types::{AuthMethod, Config},
    ConfigError,
};

/// Validate configuration
///
/// Checks that:
/// - the server port is not 0
/// - the `token` auth method has at least one management token
/// - there are enough prompts for the configured image mode
/// - video tasks have at least one effect scene when online
/// - lifetimes leave room for their refresh margins
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::Token
        && config.auth.management_token.is_none()
        && config.auth.tenant_tokens.is_empty()
    {
        return Err(ConfigError::ValidationError(
            "auth.method = \"token\" requires management_token or tenant_tokens".to_string(),
        ));
    }

    if config.provider.base_url.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "provider.base_url cannot be empty".to_string(),
        ));
    }

    let needed = config.tasks.image_mode.generated_count();
    if config.tasks.image_prompts.len() < needed {
        return Err(ConfigError::ValidationError(format!(
            "tasks.image_prompts has {} entries but image_mode needs {}",
            config.tasks.image_prompts.len(),
            needed
        )));
    }

    if config.tasks.video_online && config.tasks.video_effects.is_empty() {
        return Err(ConfigError::ValidationError(
            "tasks.video_effects cannot be empty while video tasks are online".to_string(),
        ));
    }

    if config.printing.max_outstanding_jobs < 0 {
        return Err(ConfigError::ValidationError(
            "printing.max_outstanding_jobs cannot be negative".to_string(),
        ));
    }

    if config.printing.dispatcher.batch_size == 0 {
        return Err(ConfigError::ValidationError(
            "printing.dispatcher.batch_size must be at least 1".to_string(),
        ));
    }

    let credential = &config.credential;
    if credential.jwt_refresh_margin_secs >= credential.jwt_validity_secs {
        return Err(ConfigError::ValidationError(
            "credential.jwt_refresh_margin_secs must be below jwt_validity_secs".to_string(),
        ));
    }
    if credential.access_token_refresh_margin_secs >= credential.access_token_validity_secs {
        return Err(ConfigError::ValidationError(
            "credential.access_token_refresh_margin_secs must be below access_token_validity_secs"
                .to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn base_config() -> Config {
        load_config_from_str(
            r#"
[auth]
method = "none"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&base_config()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = base_config();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_token_auth_without_tokens_fails() {
        let mut config = base_config();
        config.auth.method = AuthMethod::Token;
        assert!(validate_config(&config).is_err());

        config
            .auth
            .tenant_tokens
            .insert("expo".to_string(), "t".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_too_few_prompts_fails() {
        let mut config = base_config();
        config.tasks.image_prompts.truncate(8);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("image_prompts"));

        config.tasks.image_mode = crate::orchestrator::ImageMode::WithOrigin;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_empty_effects_only_matters_when_online() {
        let mut config = base_config();
        config.tasks.video_effects.clear();
        assert!(validate_config(&config).is_err());

        config.tasks.video_online = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_refresh_margin_fails() {
        let mut config = base_config();
        config.credential.jwt_refresh_margin_secs = config.credential.jwt_validity_secs;
        assert!(validate_config(&config).is_err());
    }
}
