//! Platform-specific path utilities for campus-auth.

use std::path::PathBuf;

use crate::error::{AuthError, Result};

/// Get the configuration directory for campus-auth.
///
/// - Linux: `~/.config/campus-auth`
/// - macOS: `~/Library/Application Support/campus-auth`
/// - Windows: `%APPDATA%\campus-auth`
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| AuthError::Config("Cannot determine config directory".to_string()))?;
    Ok(base.join("campus-auth"))
}

/// Get the main configuration file path.
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Get the default credential file path.
pub fn credentials_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("credentials.json"))
}
