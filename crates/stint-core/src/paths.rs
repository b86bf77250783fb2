//! Centralized path utilities
//!
//! All application paths in one place for consistency

use std::path::PathBuf;

use crate::constants::{paths, storage};

/// Get the stint config directory (~/.stint)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(paths::CONFIG_DIR_NAME)
}

/// Get the config file (~/.stint/config.toml)
pub fn config_file() -> PathBuf {
    config_dir().join(paths::CONFIG_FILE_NAME)
}

/// Get the logs directory (~/.stint/logs)
pub fn logs_dir() -> PathBuf {
    config_dir().join(paths::LOGS_DIR_NAME)
}

/// Get the default database file (~/.stint/stint.db)
pub fn database_path() -> PathBuf {
    config_dir().join(storage::DATABASE_FILE_NAME)
}
