mod none;
mod token;
mod traits;
mod types;

pub use none::*;
pub use token::*;
pub use traits::*;
pub use types::*;

use crate::config::AuthConfig;

/// Factory function to create the management authenticator from config
pub fn create_authenticator(config: &AuthConfig) -> Result<Box<dyn Authenticator>, AuthError> {
    use crate::config::AuthMethod;

    match config.method {
        AuthMethod::None => Ok(Box::new(NoneAuthenticator::new())),
        AuthMethod::Token => {
            if config.management_token.is_none() && config.tenant_tokens.is_empty() {
                return Err(AuthError::ConfigurationError(
                    "management_token or tenant_tokens must be set when using Token auth method"
                        .to_string(),
                ));
            }
            Ok(Box::new(ManagementTokenAuthenticator::new(
                config.management_token.clone(),
                config.tenant_tokens.clone(),
            )))
        }
    }
}
