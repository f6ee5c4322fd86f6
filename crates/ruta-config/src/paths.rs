//! Platform-specific configuration paths.
//!
//! # Lookup Order
//!
//! [`find_config`] returns the first of:
//!
//! 1. The path in `$RUTA_CONFIG`, whether or not it exists
//! 2. `ruta.toml` in the user config directory, if present
//! 3. `ruta.toml` in the system config directory, if present
//!
//! # Directory Structure
//!
//! - **User config**: `~/.config/ruta/` (Linux), `~/Library/Application Support/ruta/` (macOS), `%APPDATA%\ruta\` (Windows)
//! - **System config**: `/etc/ruta/` (Linux), `/Library/Application Support/ruta/` (macOS), `%PROGRAMDATA%\ruta\` (Windows)

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Application name used for directory paths.
const APP_NAME: &str = "ruta";

/// File name of the config file inside a config directory.
pub const CONFIG_FILE: &str = "ruta.toml";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "RUTA_CONFIG";

/// Returns the user-specific configuration directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Returns the system-wide configuration directory.
pub fn system_config_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/etc").join(APP_NAME)
    }
    #[cfg(target_os = "macos")]
    {
        PathBuf::from("/Library/Application Support").join(APP_NAME)
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("PROGRAMDATA")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData"))
            .join(APP_NAME)
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        PathBuf::from("/etc").join(APP_NAME)
    }
}

/// Path of the user config file (may not exist).
pub fn user_config_path() -> PathBuf {
    user_config_dir().join(CONFIG_FILE)
}

/// Path of the system config file (may not exist).
pub fn system_config_path() -> PathBuf {
    system_config_dir().join(CONFIG_FILE)
}

/// Locates the config file to load, if any.
pub fn find_config() -> Option<PathBuf> {
    let explicit = std::env::var_os(CONFIG_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    resolve(explicit, &[user_config_path(), system_config_path()])
}

fn resolve(explicit: Option<PathBuf>, candidates: &[PathBuf]) -> Option<PathBuf> {
    explicit.or_else(|| candidates.iter().find(|p| p.is_file()).cloned())
}

/// Creates the user config directory if needed and returns it.
pub fn ensure_user_config_dir() -> Result<PathBuf, ConfigError> {
    let dir = user_config_dir();
    ensure_dir(&dir)?;
    Ok(dir)
}

pub(crate) fn ensure_dir(dir: &Path) -> Result<(), ConfigError> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::create_dir(dir, e))?;
    }
    Ok(())
}
