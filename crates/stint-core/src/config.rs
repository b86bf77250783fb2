//! Runtime configuration
//!
//! Loaded once per process from `~/.stint/config.toml`, then overridden by
//! `STINT_*` environment variables. Every component receives what it needs
//! from this struct at construction time.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants;
use crate::paths;

pub const ENV_ENDPOINT_URL: &str = "STINT_ENDPOINT_URL";
pub const ENV_RETENTION_DAYS: &str = "STINT_RETENTION_DAYS";
pub const ENV_MAX_SURVEY_SECS: &str = "STINT_MAX_SURVEY_SECS";
pub const ENV_NAMESPACE: &str = "STINT_NAMESPACE";
pub const ENV_DB_PATH: &str = "STINT_DB_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StintConfig {
    /// Remote endpoint receiving `recordTiming` submissions
    pub endpoint_url: String,
    /// How long stored entries are kept before the sweep removes them
    pub retention_days: u32,
    /// Upper bound on a recorded survey duration
    pub max_survey_time_secs: u64,
    /// Key prefix for everything this crate stores
    pub namespace: String,
    /// SQLite file; defaults to ~/.stint/stint.db
    pub database_path: Option<PathBuf>,
}

impl Default for StintConfig {
    fn default() -> Self {
        Self {
            endpoint_url: constants::delivery::DEFAULT_ENDPOINT_URL.to_string(),
            retention_days: constants::storage::DEFAULT_RETENTION_DAYS,
            max_survey_time_secs: constants::survey::MAX_SURVEY_TIME_SECS,
            namespace: constants::storage::DEFAULT_NAMESPACE.to_string(),
            database_path: None,
        }
    }
}

impl StintConfig {
    /// Load from the default config file and the process environment
    pub fn load() -> Result<Self> {
        Self::load_from_path(&paths::config_file())
    }

    /// Load from a specific file and the process environment
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = Self::read_file(path)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
        let config: StintConfig =
            toml::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))?;

        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Apply `STINT_*` overrides using the given variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(ENV_ENDPOINT_URL) {
            self.endpoint_url = url.trim().to_string();
        }
        if let Some(days) = non_empty(ENV_RETENTION_DAYS) {
            self.retention_days = days
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of days", ENV_RETENTION_DAYS))?;
        }
        if let Some(secs) = non_empty(ENV_MAX_SURVEY_SECS) {
            self.max_survey_time_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number of seconds", ENV_MAX_SURVEY_SECS))?;
        }
        if let Some(namespace) = non_empty(ENV_NAMESPACE) {
            self.namespace = namespace;
        }
        if let Some(path) = non_empty(ENV_DB_PATH) {
            self.database_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.endpoint_url)
            .with_context(|| format!("Invalid endpoint URL: {}", self.endpoint_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("Endpoint URL must be http or https, got {}", url.scheme());
        }
        if self.namespace.is_empty() {
            bail!("Storage namespace must not be empty");
        }
        if self.max_survey_time_secs == 0 {
            bail!("Maximum survey time must be positive");
        }
        Ok(())
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.retention_days))
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(paths::database_path)
    }
}
