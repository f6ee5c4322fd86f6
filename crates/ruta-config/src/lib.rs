//! Configuration files, paths and logging setup for the ruta routing core.
//!
//! # Features
//!
//! - **Config File**: Load and save [`ConfigFile`] as TOML, validated on load
//! - **Paths**: Platform-specific user and system config locations
//! - **Logging**: Install a `tracing` subscriber from the `[logging]` table
//!
//! # Example
//!
//! ```rust,no_run
//! use ruta_config::{ConfigFile, init_tracing};
//!
//! let config = ConfigFile::load_or_default(None)?;
//! init_tracing(&config.logging)?;
//! let mut router = config.build_router()?;
//! router.make_routing();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod file;

/// Tracing subscriber setup.
pub mod logging;

/// Platform-specific paths for configuration.
pub mod paths;

pub use error::ConfigError;
pub use file::ConfigFile;
pub use logging::{DEFAULT_FILTER, LoggingConfig, init_tracing};
pub use paths::{
    CONFIG_ENV, CONFIG_FILE, ensure_user_config_dir, find_config, system_config_dir,
    system_config_path, user_config_dir, user_config_path,
};
