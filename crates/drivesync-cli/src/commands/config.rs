//! Config command - View and manage drivesync configuration
//!
//! Provides the `drivesync config` CLI command which:
//! 1. Shows the current configuration (YAML or JSON)
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors
//! 4. Prints the configuration file location

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use drivesync_core::config::Config;

use super::CommandContext;

/// Placeholder printed instead of the access token
const REDACTED: &str = "<redacted>";

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "sync.chunk_size")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx).await,
            ConfigCommand::Set { key, value } => self.execute_set(ctx, key, value).await,
            ConfigCommand::Validate => self.execute_validate(ctx).await,
            ConfigCommand::Path => self.execute_path(ctx).await,
        }
    }

    async fn execute_show(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config_path = &ctx.config_path;
        let mut config = Config::load_or_default(config_path);
        if config.remote.access_token.is_some() {
            config.remote.access_token = Some(REDACTED.to_string());
        }

        info!(config_path = %config_path.display(), "Showing configuration");

        if !config_path.exists() {
            formatter.warn("Configuration file not found, showing defaults");
        }

        if ctx.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", config_path.display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;

            for line in yaml.lines() {
                formatter.info(line);
            }
        }

        Ok(())
    }

    async fn execute_set(&self, ctx: &CommandContext, key: &str, value: &str) -> Result<()> {
        let formatter = ctx.formatter();
        let config_path = &ctx.config_path;
        let mut config = Config::load_or_default(config_path);

        info!(key = %key, "Setting configuration value");

        if let Err(e) = apply_config_value(&mut config, key, value) {
            if ctx.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "error": e.to_string(),
                }));
            } else {
                formatter.error(&format!("Failed to set '{}': {}", key, e));
                formatter.info("");
                formatter.info("Supported keys:");
                for (name, help) in SUPPORTED_KEYS {
                    formatter.info(&format!("  {name:<24} - {help}"));
                }
            }
            return Ok(());
        }

        let error_msgs: Vec<String> = config
            .validate()
            .iter()
            .filter(|e| e.field == key)
            .map(|e| e.message.clone())
            .collect();
        if !error_msgs.is_empty() {
            if ctx.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "errors": error_msgs,
                }));
            } else {
                formatter.error(&format!(
                    "Invalid value for '{}': {}",
                    key,
                    error_msgs.join("; ")
                ));
            }
            return Ok(());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
        }
        let yaml = serde_yaml::to_string(&config).context("Failed to serialize configuration")?;
        std::fs::write(config_path, &yaml).context("Failed to write configuration file")?;

        if ctx.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "key": key,
                "config_path": config_path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Set {}", key));
            formatter.info(&format!("Saved to {}", config_path.display()));
        }

        Ok(())
    }

    async fn execute_validate(&self, ctx: &CommandContext) -> Result<()> {
        let formatter = ctx.formatter();
        let config_path = &ctx.config_path;

        // Load explicitly so parse errors are reported
        let config = match Config::load(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                if !config_path.exists() {
                    if ctx.is_json() {
                        formatter.print_json(&serde_json::json!({
                            "valid": false,
                            "config_path": config_path.display().to_string(),
                            "errors": ["Configuration file not found. Using defaults."],
                        }));
                    } else {
                        formatter.info(&format!(
                            "Configuration file not found at {}",
                            config_path.display()
                        ));
                        formatter.info("Using default configuration. Run 'drivesync config set <key> <value>' to create one.");
                    }
                    return Ok(());
                }

                if ctx.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": config_path.display().to_string(),
                        "errors": [format!("Failed to parse configuration: {:#}", e)],
                    }));
                } else {
                    formatter.error(&format!("Failed to parse configuration: {:#}", e));
                    formatter.info(&format!("File: {}", config_path.display()));
                }
                return Ok(());
            }
        };

        info!(config_path = %config_path.display(), "Validating configuration");

        let errors = config.validate();

        if ctx.is_json() {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {}", config_path.display()));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }

        Ok(())
    }

    async fn execute_path(&self, ctx: &CommandContext) -> Result<()> {
        if ctx.is_json() {
            ctx.formatter().print_json(&serde_json::json!({
                "config_path": ctx.config_path.display().to_string(),
                "exists": ctx.config_path.exists(),
            }));
        } else {
            println!("{}", ctx.config_path.display());
        }
        Ok(())
    }
}

/// Keys accepted by `config set`, with a short description
const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("sync.chunk_size", "Upload chunk size in bytes"),
    ("sync.timeout_secs", "Idle transfer timeout (0 disables)"),
    ("sync.cache_file", "Fingerprint cache file path"),
    ("sync.ignore_file", "Ignore file name at the local root"),
    (
        "conflicts.default_strategy",
        "none|keep_local|keep_remote|keep_largest",
    ),
    ("remote.api_base_url", "Drive metadata API URL"),
    ("remote.upload_base_url", "Drive upload API URL"),
    ("remote.access_token", "OAuth access token (none to clear)"),
    ("logging.level", "trace|debug|info|warn|error"),
    ("logging.format", "text|json"),
];

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- sync ---
        "sync.chunk_size" => {
            config.sync.chunk_size = value
                .parse::<u64>()
                .context("Expected a positive integer for sync.chunk_size")?;
        }
        "sync.timeout_secs" => {
            config.sync.timeout_secs = value
                .parse::<u64>()
                .context("Expected a positive integer for sync.timeout_secs")?;
        }
        "sync.cache_file" => {
            config.sync.cache_file = PathBuf::from(value);
        }
        "sync.ignore_file" => {
            config.sync.ignore_file = value.to_string();
        }

        // --- conflicts ---
        "conflicts.default_strategy" => {
            config.conflicts.default_strategy = value.to_string();
        }

        // --- remote ---
        "remote.api_base_url" => {
            config.remote.api_base_url = value.to_string();
        }
        "remote.upload_base_url" => {
            config.remote.upload_base_url = value.to_string();
        }
        "remote.access_token" => {
            config.remote.access_token = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.to_string())
            };
        }

        // --- logging ---
        "logging.level" => {
            config.logging.level = value.to_string();
        }
        "logging.format" => {
            config.logging.format = value.to_string();
        }

        _ => {
            anyhow::bail!("Unknown configuration key: '{}'", key);
        }
    }

    Ok(())
}
