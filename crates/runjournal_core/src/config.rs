//! Application configuration.
//!
//! # Responsibility
//! - Resolve data, projection, and log locations from one data directory.
//! - Validate settings before any file is touched.
//!
//! # Invariants
//! - `data_dir` is absolute once validated.
//! - The projection directory is disposable and may be deleted at any time.

use crate::logging::{default_log_level, normalize_level};
use crate::projection::engine::EngineConfig;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const PROJECTION_DIRECTORY: &str = ".projection";
const LOG_DIRECTORY: &str = "logs";

/// Errors from configuration validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Data directory is empty.
    EmptyDataDir,
    /// A configured directory is not absolute.
    RelativePath { field: &'static str, path: PathBuf },
    /// Log level is not recognized.
    UnknownLogLevel(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyDataDir => write!(f, "data directory must not be empty"),
            Self::RelativePath { field, path } => {
                write!(f, "{field} must be absolute, got `{}`", path.display())
            }
            Self::UnknownLogLevel(level) => write!(f, "unknown log level `{level}`"),
        }
    }
}

impl Error for ConfigError {}

/// Locations and log settings of one journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub projection_dir: PathBuf,
    pub log_level: String,
    pub log_dir: PathBuf,
}

impl AppConfig {
    /// Derives default locations under `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            projection_dir: data_dir.join(PROJECTION_DIRECTORY),
            log_dir: data_dir.join(LOG_DIRECTORY),
            log_level: default_log_level().to_string(),
            data_dir,
        }
    }

    pub fn with_projection_dir(mut self, projection_dir: impl Into<PathBuf>) -> Self {
        self.projection_dir = projection_dir.into();
        self
    }

    pub fn with_log_level(mut self, log_level: impl Into<String>) -> Self {
        self.log_level = log_level.into();
        self
    }

    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDataDir);
        }
        require_absolute("data_dir", &self.data_dir)?;
        require_absolute("projection_dir", &self.projection_dir)?;
        require_absolute("log_dir", &self.log_dir)?;
        normalize_level(&self.log_level)
            .map_err(|_| ConfigError::UnknownLogLevel(self.log_level.clone()))?;
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::new(self.projection_dir.clone())
    }
}

fn require_absolute(field: &'static str, path: &Path) -> Result<(), ConfigError> {
    if path.is_absolute() {
        return Ok(());
    }
    Err(ConfigError::RelativePath {
        field,
        path: path.to_path_buf(),
    })
}
