//! CLI subcommands

pub mod completions;
pub mod config;
pub mod sync;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use drivesync_core::config::{Config, ACCESS_TOKEN_ENV};
use drivesync_core::ports::ISyncReporter;
use drivesync_remote::{DriveClient, DriveStorage};
use tracing::info;

use crate::output::{get_formatter, HumanReporter, JsonReporter, OutputFormat, OutputFormatter};

/// Global flags shared by every command
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub format: OutputFormat,
    pub quiet: bool,
    pub config_path: PathBuf,
}

impl CommandContext {
    pub fn new(format: OutputFormat, quiet: bool, config_path: PathBuf) -> Self {
        Self {
            format,
            quiet,
            config_path,
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.is_json())
    }

    /// Load and validate the configuration; a missing file yields defaults
    pub fn load_config(&self) -> Result<Config> {
        if !self.config_path.exists() {
            info!(config_path = %self.config_path.display(), "No configuration file, using defaults");
            return Ok(Config::default());
        }

        let config = Config::load(&self.config_path)?;
        let errors = config.validate();
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            anyhow::bail!(
                "Invalid configuration in {}: {}",
                self.config_path.display(),
                messages.join("; ")
            );
        }

        info!(config_path = %self.config_path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn reporter(&self, show_progress: bool) -> Arc<dyn ISyncReporter> {
        if self.is_json() {
            Arc::new(JsonReporter)
        } else {
            Arc::new(HumanReporter::new(self.quiet, show_progress))
        }
    }
}

/// Build the Drive adapter from configuration
pub fn connect(config: &Config) -> Result<Arc<DriveStorage>> {
    let token = config.access_token().with_context(|| {
        format!("No access token configured. Set {ACCESS_TOKEN_ENV} or remote.access_token")
    })?;

    let client = DriveClient::with_base_urls(
        token,
        &config.remote.api_base_url,
        &config.remote.upload_base_url,
    );
    Ok(Arc::new(DriveStorage::new(client)))
}
