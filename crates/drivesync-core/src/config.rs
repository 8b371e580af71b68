//! Configuration module for drivesync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::domain::ConflictResolution;

/// Environment variable that overrides `remote.access_token`.
pub const ACCESS_TOKEN_ENV: &str = "DRIVESYNC_ACCESS_TOKEN";

/// Default upload chunk size: 8 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 8 * 1024 * 1024;

/// Default idle timeout for transfers, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default name of the per-root ignore file.
pub const DEFAULT_IGNORE_FILE: &str = ".drivesyncignore";

/// Default name of the fingerprint cache file in the config directory.
pub const DEFAULT_CACHE_FILE: &str = "file_cache.json";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for drivesync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub conflicts: ConflictsConfig,
    pub remote: RemoteConfig,
    pub logging: LoggingConfig,
}

/// Synchronization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Upload request chunk size in bytes.
    pub chunk_size: u64,
    /// Seconds without transfer activity before a transfer is cancelled; 0 disables.
    pub timeout_secs: u64,
    /// Path of the fingerprint cache file.
    pub cache_file: PathBuf,
    /// Name of the ignore file looked up at the local root.
    pub ignore_file: String,
}

/// Conflict resolution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictsConfig {
    /// Strategy used when no flag is given: `none`, `keep_local`, `keep_remote`, or `keep_largest`.
    pub default_strategy: String,
}

/// Remote storage service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the metadata API.
    pub api_base_url: String,
    /// Base URL of the upload API.
    pub upload_base_url: String,
    /// OAuth access token. `DRIVESYNC_ACCESS_TOKEN` takes precedence.
    pub access_token: Option<String>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `text` or `json`.
    pub format: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate directory holding drivesync's files.
    ///
    /// Typically `$XDG_CONFIG_HOME/drivesync` on Linux.
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("drivesync")
    }

    /// Platform-appropriate default path for the configuration file.
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    /// Access token from the environment, falling back to the config file.
    pub fn access_token(&self) -> Option<String> {
        std::env::var(ACCESS_TOKEN_ENV)
            .ok()
            .filter(|t| !t.is_empty())
            .or_else(|| self.remote.access_token.clone())
    }

    /// The configured default conflict resolution.
    pub fn default_resolution(&self) -> anyhow::Result<ConflictResolution> {
        self.conflicts
            .default_strategy
            .parse()
            .context("Invalid conflicts.default_strategy")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            cache_file: Config::config_dir().join(DEFAULT_CACHE_FILE),
            ignore_file: DEFAULT_IGNORE_FILE.to_string(),
        }
    }
}

impl Default for ConflictsConfig {
    fn default() -> Self {
        Self {
            default_strategy: "none".to_string(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://www.googleapis.com/drive/v3".to_string(),
            upload_base_url: "https://www.googleapis.com/upload/drive/v3".to_string(),
            access_token: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "text".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.chunk_size"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["text", "json"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.chunk_size == 0 {
            errors.push(ValidationError {
                field: "sync.chunk_size".into(),
                message: "must be greater than 0".into(),
            });
        } else if self.sync.chunk_size > (isize::MAX as u64) - 1 {
            errors.push(ValidationError {
                field: "sync.chunk_size".into(),
                message: format!(
                    "too big, max chunk size for this computer is {}",
                    (isize::MAX as u64) - 1
                ),
            });
        }
        if self.sync.ignore_file.is_empty() || self.sync.ignore_file.contains('/') {
            errors.push(ValidationError {
                field: "sync.ignore_file".into(),
                message: "must be a plain file name".into(),
            });
        }
        if self.sync.cache_file.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "sync.cache_file".into(),
                message: "must not be empty".into(),
            });
        }

        // --- conflicts ---
        if self
            .conflicts
            .default_strategy
            .parse::<ConflictResolution>()
            .is_err()
        {
            errors.push(ValidationError {
                field: "conflicts.default_strategy".into(),
                message: format!(
                    "invalid strategy '{}', expected one of: none, keep_local, keep_remote, keep_largest",
                    self.conflicts.default_strategy
                ),
            });
        }

        // --- remote ---
        for (field, value) in [
            ("remote.api_base_url", &self.remote.api_base_url),
            ("remote.upload_base_url", &self.remote.upload_base_url),
        ] {
            if url::Url::parse(value).is_err() {
                errors.push(ValidationError {
                    field: field.into(),
                    message: format!("not a valid URL: {value}"),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}', expected one of: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Start from the default configuration.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn sync_chunk_size(mut self, bytes: u64) -> Self {
        self.config.sync.chunk_size = bytes;
        self
    }

    pub fn sync_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.sync.timeout_secs = seconds;
        self
    }

    pub fn sync_cache_file(mut self, path: PathBuf) -> Self {
        self.config.sync.cache_file = path;
        self
    }

    pub fn sync_ignore_file(mut self, name: impl Into<String>) -> Self {
        self.config.sync.ignore_file = name.into();
        self
    }

    // --- conflicts ---

    pub fn conflicts_default_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.config.conflicts.default_strategy = strategy.into();
        self
    }

    // --- remote ---

    pub fn remote_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.api_base_url = url.into();
        self
    }

    pub fn remote_upload_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.upload_base_url = url.into();
        self
    }

    pub fn remote_access_token(mut self, token: impl Into<String>) -> Self {
        self.config.remote.access_token = Some(token.into());
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
