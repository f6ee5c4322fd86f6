//! Router configuration.

use serde::{Deserialize, Serialize};

use crate::error::RoutingError;
use crate::node::CHANNELS_MAX;

/// What to do when a node is registered under a name that is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameCollision {
    /// Fail the registration with [`RoutingError::DuplicateName`].
    #[default]
    Reject,
    /// Register under `name.2`, `name.3`, ... instead.
    Rename,
}

/// Settings for the built-in fallback policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    /// Install `default-output` / `default-input` groups and route every stream class
    /// through them. Without them the fallback routes nothing automatically.
    pub default_groups: bool,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            default_groups: true,
        }
    }
}

/// Configuration for a [`Router`](crate::Router).
///
/// Use [`RouterConfig::default()`] for sensible defaults, or customize as needed.
///
/// # Example
///
/// ```
/// use ruta_core::{NameCollision, RouterConfig};
///
/// let config = RouterConfig {
///     name_collision: NameCollision::Rename,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Node name collision handling.
    /// Default: reject
    pub name_collision: NameCollision,

    /// Largest channel count a node may declare.
    /// Default: 32
    pub max_channels: u8,

    /// Priority of the native domain when choosing the owning domain of a connection.
    /// Default: 0
    pub native_domain_priority: i32,

    /// Fallback policy settings.
    pub fallback: FallbackConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            name_collision: NameCollision::Reject,
            max_channels: CHANNELS_MAX,
            native_domain_priority: 0,
            fallback: FallbackConfig::default(),
        }
    }
}

impl RouterConfig {
    /// Checks that every value is within range.
    pub fn validate(&self) -> Result<(), RoutingError> {
        if self.max_channels == 0 {
            return Err(RoutingError::invalid_config("max_channels must be at least 1"));
        }
        if self.max_channels > CHANNELS_MAX {
            return Err(RoutingError::invalid_config(format!(
                "max_channels must not exceed {CHANNELS_MAX}"
            )));
        }
        Ok(())
    }
}
