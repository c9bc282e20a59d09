//! Configuration management for campus-auth.

pub mod paths;
pub mod settings;

pub use paths::{config_file, credentials_file};
pub use settings::{AuthConfig, HttpConfig, OAuthConfig, SsoConfig};

use std::path::{Path, PathBuf};

use crate::error::{AuthError, Result};

/// Load configuration from the default config file.
///
/// If the config file doesn't exist, returns default configuration.
pub fn load_config() -> Result<AuthConfig> {
    let path = config_file()?;
    load_config_from(&path)
}

/// Load configuration from a specific path.
///
/// If the file doesn't exist, returns default configuration.
pub fn load_config_from(path: &Path) -> Result<AuthConfig> {
    if !path.exists() {
        return Ok(AuthConfig::default().with_env_overrides());
    }

    let contents = std::fs::read_to_string(path)?;
    let config: AuthConfig =
        toml::from_str(&contents).map_err(|e| AuthError::ConfigRead(e.to_string()))?;

    Ok(config.with_env_overrides())
}

/// Resolve where credentials are stored for this configuration.
pub fn credentials_path(config: &AuthConfig) -> Result<PathBuf> {
    match &config.store.path {
        Some(path) => Ok(path.clone()),
        None => credentials_file(),
    }
}
