//! Tracing subscriber setup.
//!
//! `RUST_LOG` takes precedence over the configured filter, so a deployment can be
//! made verbose without editing its config file.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;

/// Default filter directive.
pub const DEFAULT_FILTER: &str = "info";

/// The `[logging]` table of a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `"info"` or `"warn,ruta_core=debug"`.
    /// Default: info
    pub filter: String,

    /// Colorize output.
    /// Default: true
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Parses the configured directive.
    pub fn env_filter(&self) -> Result<EnvFilter, ConfigError> {
        EnvFilter::try_new(&self.filter)
            .map_err(|e| ConfigError::logging(format!("bad filter '{}': {e}", self.filter)))
    }

    /// Checks that the filter directive parses.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.env_filter().map(|_| ())
    }
}

/// Installs the global `tracing` subscriber.
///
/// Fails if the filter does not parse or a global subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => config.env_filter()?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(config.ansi)
        .try_init()
        .map_err(|e| ConfigError::logging(e.to_string()))
}
