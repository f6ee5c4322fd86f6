//! The on-disk config file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use ruta_core::{Router, RouterConfig, RoutingError};

use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use crate::paths;

/// Contents of a `ruta.toml` file.
///
/// Every table and key is optional; missing values take their defaults.
///
/// ```toml
/// [router]
/// name_collision = "rename"
/// max_channels = 8
///
/// [router.fallback]
/// default_groups = true
///
/// [logging]
/// filter = "info,ruta_core=debug"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Router settings.
    pub router: RouterConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

impl ConfigFile {
    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let file = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "config_load: ok");
        Ok(file)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let file: Self = toml::from_str(s)?;
        file.validate()?;
        Ok(file)
    }

    /// Save to a file, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            paths::ensure_dir(parent)?;
        }
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check router ranges and the log filter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.router.validate()?;
        self.logging.validate()
    }

    /// Loads `path` if given, else the file [`paths::find_config`] locates, else defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path.map(Path::to_path_buf).or_else(paths::find_config) {
            Some(found) => Self::load(found),
            None => {
                tracing::debug!("config_load: no file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Builds a router from the `[router]` table.
    pub fn build_router(&self) -> Result<Router, RoutingError> {
        Router::new(self.router.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruta_core::NameCollision;

    #[test]
    fn empty_file_is_default() {
        let file = ConfigFile::from_toml("").unwrap();
        assert_eq!(file, ConfigFile::default());
    }

    #[test]
    fn partial_tables_fill_defaults() {
        let file = ConfigFile::from_toml(
            r#"
            [router]
            name_collision = "rename"

            [router.fallback]
            default_groups = false
            "#,
        )
        .unwrap();
        assert_eq!(file.router.name_collision, NameCollision::Rename);
        assert_eq!(file.router.max_channels, 32);
        assert!(!file.router.fallback.default_groups);
        assert_eq!(file.logging, LoggingConfig::default());
    }

    #[test]
    fn out_of_range_router_value_rejected() {
        let err = ConfigFile::from_toml("[router]\nmax_channels = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Router(_)));
    }

    #[test]
    fn unknown_collision_mode_is_parse_error() {
        let err = ConfigFile::from_toml("[router]\nname_collision = \"merge\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse(_)));
    }

    #[test]
    fn bad_log_filter_rejected() {
        let err = ConfigFile::from_toml("[logging]\nfilter = \"a=loud\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Logging { .. }));
    }

    #[test]
    fn toml_text_reparses_identically() {
        let file = ConfigFile {
            router: RouterConfig {
                name_collision: NameCollision::Rename,
                max_channels: 8,
                native_domain_priority: -3,
                ..Default::default()
            },
            logging: LoggingConfig {
                filter: "debug".into(),
                ansi: false,
            },
        };
        let text = file.to_toml().unwrap();
        assert!(text.contains("[router.fallback]"));
        assert_eq!(ConfigFile::from_toml(&text).unwrap(), file);
    }

    #[test]
    fn build_router_applies_settings() {
        let file = ConfigFile::from_toml("[router.fallback]\ndefault_groups = false\n").unwrap();
        let router = file.build_router().unwrap();
        assert!(router.groups().is_empty());
        assert!(!router.config().fallback.default_groups);
    }
}
