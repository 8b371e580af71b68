//! Sync commands - Synchronize directories with Google Drive
//!
//! Provides the `drivesync sync` CLI commands which:
//! 1. Load configuration and resolve the access token
//! 2. Create the adapters (Drive, local filesystem, fingerprint cache)
//! 3. Run the SyncEngine and display its progress lines and summary
//!
//! `sync list` and `sync content` print sync roots and their trees.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::info;

use drivesync_conflict::{effective_resolution, resolution_from_flags};
use drivesync_core::config::Config;
use drivesync_core::domain::{
    format_datetime, format_size, truncate_middle, ConflictResolution, RemoteId, SyncSummary,
};
use drivesync_core::ports::{ILocalFileSystem, NullReporter};
use drivesync_sync::{
    CachedComparer, DirectComparer, DownloadSyncArgs, FileCache, FileComparer,
    LocalFileSystemAdapter, SyncEngine, UploadSyncArgs,
};

use super::{connect, CommandContext};
use crate::output::Table;

/// Sync subcommands
#[derive(Debug, Subcommand)]
pub enum SyncCommand {
    /// Upload a local directory into a remote sync root
    Upload(UploadCommand),
    /// Download a remote sync root into a local directory
    Download(DownloadCommand),
    /// List remote directories marked as sync roots
    List(ListCommand),
    /// Recursively list the content of a sync root
    Content(ContentCommand),
}

impl SyncCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match self {
            SyncCommand::Upload(cmd) => cmd.execute(ctx).await,
            SyncCommand::Download(cmd) => cmd.execute(ctx).await,
            SyncCommand::List(cmd) => cmd.execute(ctx).await,
            SyncCommand::Content(cmd) => cmd.execute(ctx).await,
        }
    }
}

// ============================================================================
// Shared transfer flags
// ============================================================================

/// Options common to upload and download runs
#[derive(Debug, Args)]
pub struct TransferFlags {
    /// Resolve conflicts by keeping the local file
    #[arg(long)]
    pub keep_local: bool,

    /// Resolve conflicts by keeping the remote file
    #[arg(long)]
    pub keep_remote: bool,

    /// Resolve conflicts by keeping the largest file
    #[arg(long)]
    pub keep_largest: bool,

    /// Delete destination files that do not exist on the source side
    #[arg(long)]
    pub delete_extraneous: bool,

    /// Show what would be done without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Hide byte progress of individual transfers
    #[arg(long)]
    pub no_progress: bool,

    /// Seconds without transfer activity before giving up (0 disables)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Always read local files to compare fingerprints
    #[arg(long)]
    pub no_cache: bool,
}

impl TransferFlags {
    /// Flags win over `conflicts.default_strategy`
    pub fn resolution(&self, config: &Config) -> Result<ConflictResolution> {
        let flags = resolution_from_flags(self.keep_local, self.keep_remote, self.keep_largest)?;
        Ok(effective_resolution(
            flags,
            &config.conflicts.default_strategy,
        )?)
    }

    pub fn timeout(&self, config: &Config) -> Duration {
        Duration::from_secs(self.timeout.unwrap_or(config.sync.timeout_secs))
    }

    async fn comparer(
        &self,
        fs: Arc<dyn ILocalFileSystem>,
        config: &Config,
    ) -> Arc<dyn FileComparer> {
        if self.no_cache {
            return Arc::new(DirectComparer::new(fs));
        }
        let cache = FileCache::load(&config.sync.cache_file).await;
        info!(
            path = %cache.path().display(),
            entries = cache.len(),
            "Using fingerprint cache"
        );
        Arc::new(CachedComparer::new(fs, cache))
    }
}

/// Resolve `path` against the working directory without requiring it to exist
fn absolute_path(path: &Path) -> Result<PathBuf> {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return Ok(canonical);
    }

    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to resolve current directory")?
            .join(path)
    };
    Ok(joined
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect())
}

fn print_summary(ctx: &CommandContext, summary: &SyncSummary) -> Result<()> {
    let formatter = ctx.formatter();
    if ctx.is_json() {
        let mut value = serde_json::to_value(summary).context("Failed to serialize summary")?;
        value["event"] = serde_json::json!("summary");
        formatter.print_json(&value);
    } else if summary.dry_run && !ctx.quiet {
        formatter.info("Dry run, no changes were made");
    }
    Ok(())
}

// ============================================================================
// upload / download
// ============================================================================

#[derive(Debug, Args)]
pub struct UploadCommand {
    /// Local directory to upload
    pub path: PathBuf,

    /// Id of the remote directory to upload into
    pub root_id: RemoteId,

    #[command(flatten)]
    pub flags: TransferFlags,

    /// Upload request chunk size in bytes
    #[arg(long, value_name = "BYTES")]
    pub chunksize: Option<u64>,
}

impl UploadCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let config = ctx.load_config()?;
        let resolution = self.flags.resolution(&config)?;
        let remote = connect(&config)?;
        let fs: Arc<dyn ILocalFileSystem> = Arc::new(LocalFileSystemAdapter::new());

        let args = UploadSyncArgs {
            local_path: absolute_path(&self.path)?,
            root_id: self.root_id.clone(),
            dry_run: self.flags.dry_run,
            delete_extraneous: self.flags.delete_extraneous,
            resolution,
            timeout: self.flags.timeout(&config),
            chunk_size: self.chunksize.unwrap_or(config.sync.chunk_size),
            comparer: self.flags.comparer(fs.clone(), &config).await,
            ignore_file: config.sync.ignore_file.clone(),
        };

        let engine = SyncEngine::new(remote, fs, ctx.reporter(!self.flags.no_progress));
        let summary = engine.upload_sync(args).await?;
        print_summary(ctx, &summary)
    }
}

#[derive(Debug, Args)]
pub struct DownloadCommand {
    /// Id of the remote sync root to download
    pub root_id: RemoteId,

    /// Local directory to download into; created when missing
    pub path: PathBuf,

    #[command(flatten)]
    pub flags: TransferFlags,
}

impl DownloadCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let config = ctx.load_config()?;
        let resolution = self.flags.resolution(&config)?;
        let remote = connect(&config)?;
        let fs: Arc<dyn ILocalFileSystem> = Arc::new(LocalFileSystemAdapter::new());

        let args = DownloadSyncArgs {
            root_id: self.root_id.clone(),
            local_path: absolute_path(&self.path)?,
            dry_run: self.flags.dry_run,
            delete_extraneous: self.flags.delete_extraneous,
            resolution,
            timeout: self.flags.timeout(&config),
            comparer: self.flags.comparer(fs.clone(), &config).await,
            ignore_file: config.sync.ignore_file.clone(),
        };

        let engine = SyncEngine::new(remote, fs, ctx.reporter(!self.flags.no_progress));
        let summary = engine.download_sync(args).await?;
        print_summary(ctx, &summary)
    }
}

// ============================================================================
// list / content
// ============================================================================

fn listing_engine(config: &Config) -> Result<SyncEngine> {
    Ok(SyncEngine::new(
        connect(config)?,
        Arc::new(LocalFileSystemAdapter::new()),
        Arc::new(NullReporter),
    ))
}

#[derive(Debug, Args)]
pub struct ListCommand {
    /// Do not print column headers
    #[arg(long)]
    pub no_header: bool,
}

impl ListCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let config = ctx.load_config()?;
        let roots = listing_engine(&config)?.list_sync_roots().await?;

        if ctx.is_json() {
            let items: Vec<serde_json::Value> = roots
                .iter()
                .map(|root| {
                    serde_json::json!({
                        "id": root.id,
                        "name": root.name,
                        "created": root.created,
                    })
                })
                .collect();
            ctx.formatter().print_json(&serde_json::Value::Array(items));
            return Ok(());
        }

        let mut table = Table::new(vec!["Id", "Name", "Created"]);
        for root in &roots {
            table.push(vec![
                root.id.to_string(),
                root.name.clone(),
                root.created.as_ref().map(format_datetime).unwrap_or_default(),
            ]);
        }
        println!("{}", table.render(!self.no_header));
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct ContentCommand {
    /// Id of the sync root to list
    pub root_id: RemoteId,

    /// Do not print column headers
    #[arg(long)]
    pub no_header: bool,

    /// Print sizes in bytes
    #[arg(long)]
    pub bytes: bool,

    /// Truncate the path column to this width (0 prints full paths)
    #[arg(long, default_value_t = 0, value_name = "WIDTH")]
    pub path_width: usize,
}

impl ContentCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let config = ctx.load_config()?;
        let files = listing_engine(&config)?
            .list_sync_content(&self.root_id)
            .await?;

        if ctx.is_json() {
            let items: Vec<serde_json::Value> = files
                .iter()
                .map(|file| {
                    serde_json::json!({
                        "id": file.id,
                        "path": file.rel_path,
                        "type": file.kind(),
                        "size": file.size,
                        "md5": file.md5,
                        "modified": file.modified,
                    })
                })
                .collect();
            ctx.formatter().print_json(&serde_json::Value::Array(items));
            return Ok(());
        }

        let mut table = Table::new(vec!["Id", "Path", "Type", "Size", "Modified"]);
        for file in &files {
            table.push(vec![
                file.id.to_string(),
                truncate_middle(file.rel_path.as_str(), self.path_width),
                file.kind().to_string(),
                format_size(file.size, self.bytes),
                format_datetime(&file.modified),
            ]);
        }
        println!("{}", table.render(!self.no_header));
        Ok(())
    }
}
