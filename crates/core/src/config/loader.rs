use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix of environment overrides, e.g. `KIOSK_PRINTING__MAX_OUTSTANDING_JOBS=5`.
pub const ENV_PREFIX: &str = "KIOSK_";

/// The config file layered under `KIOSK_*` environment overrides.
///
/// `__` separates nesting levels, so `KIOSK_PROVIDER__SECRET_KEY` sets
/// `provider.secret_key` and keeps provider secrets out of the file.
pub fn config_sources(path: &Path) -> Figment {
    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    config_sources(path)
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
