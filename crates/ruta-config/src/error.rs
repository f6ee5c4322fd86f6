//! Error types for configuration operations.

use std::path::PathBuf;
use thiserror::Error;

use ruta_core::RoutingError;

/// Errors that can occur while loading, saving or applying configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to create directory
    #[error("failed to create directory '{path}': {source}")]
    CreateDir {
        /// Path of the directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// Router settings out of range
    #[error("invalid router settings: {0}")]
    Router(#[from] RoutingError),

    /// Bad log filter, or a global subscriber is already installed
    #[error("logging setup failed: {reason}")]
    Logging {
        /// What went wrong.
        reason: String,
    },
}

impl ConfigError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Create a directory creation error.
    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigError::CreateDir {
            path: path.into(),
            source,
        }
    }

    /// Create a logging setup error.
    pub fn logging(reason: impl Into<String>) -> Self {
        ConfigError::Logging {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io;

    fn mock_io_err() -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, "no such file")
    }

    #[test]
    fn read_file_display_and_source() {
        let err = ConfigError::read_file("/etc/ruta/ruta.toml", mock_io_err());
        assert_eq!(
            err.to_string(),
            "failed to read file '/etc/ruta/ruta.toml': no such file"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn write_file_display() {
        let err = ConfigError::write_file("out.toml", mock_io_err());
        assert!(err.to_string().starts_with("failed to write file 'out.toml'"));
        assert!(err.source().is_some());
    }

    #[test]
    fn create_dir_display() {
        let err = ConfigError::create_dir("/nope", mock_io_err());
        assert!(err.to_string().contains("/nope"));
        assert!(matches!(err, ConfigError::CreateDir { .. }));
    }

    #[test]
    fn toml_parse_from() {
        let parse_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err: ConfigError = parse_err.into();
        assert!(matches!(err, ConfigError::TomlParse(_)));
        assert!(err.to_string().starts_with("failed to parse TOML"));
    }

    #[test]
    fn router_error_from() {
        let err: ConfigError = RoutingError::invalid_config("max_channels must be at least 1").into();
        assert!(matches!(err, ConfigError::Router(_)));
        assert!(err.to_string().contains("max_channels"));
    }

    #[test]
    fn logging_display() {
        let err = ConfigError::logging("subscriber already set");
        assert_eq!(err.to_string(), "logging setup failed: subscriber already set");
        assert!(err.source().is_none());
    }
}
