//! Transfer executor
//!
//! Every mutation of either tree goes through [`TransferExecutor`]. Remote
//! calls are retried on transient failures, and each attempt that moves
//! content runs under a fresh [`IdleTimeout`]. The local file is reopened
//! for every attempt so a retry always starts from the first byte.
//!
//! In dry-run mode nothing is mutated. Created remote directories are
//! returned as placeholders so later items can still resolve their parent.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, instrument};

use drivesync_core::domain::files::sync_item_properties;
use drivesync_core::domain::{
    ChangedFile, LocalFile, RemoteFile, RemoteId, SyncPath, FOLDER_MIME_TYPE,
};
use drivesync_core::ports::{
    ContentReader, ILocalFileSystem, IRemoteStorage, NewItem, ProgressFn, Upload,
};

use crate::retry::with_retry;
use crate::timeout::{IdleTimeout, ProgressReader};

/// Knobs shared by every transfer of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    pub dry_run: bool,
    /// Idle timeout per transfer; zero disables it
    pub timeout: Duration,
    /// Upload request chunk size in bytes
    pub chunk_size: u64,
}

pub struct TransferExecutor {
    remote: Arc<dyn IRemoteStorage>,
    fs: Arc<dyn ILocalFileSystem>,
    options: TransferOptions,
    progress: Option<ProgressFn>,
}

impl TransferExecutor {
    pub fn new(
        remote: Arc<dyn IRemoteStorage>,
        fs: Arc<dyn ILocalFileSystem>,
        options: TransferOptions,
        progress: Option<ProgressFn>,
    ) -> Self {
        Self {
            remote,
            fs,
            options,
            progress,
        }
    }

    fn instrument(&self, reader: ContentReader, total: u64, idle: &IdleTimeout) -> ContentReader {
        let reader = idle.wrap(reader);
        match &self.progress {
            Some(progress) => Box::new(ProgressReader::new(reader, total, progress.clone())),
            None => Box::new(reader),
        }
    }

    // ========================================================================
    // Remote side
    // ========================================================================

    /// Create the remote counterpart of a local directory
    #[instrument(skip(self, local), fields(path = %local.rel_path))]
    pub async fn create_remote_dir(
        &self,
        local: &LocalFile,
        parent: &RemoteId,
        root_id: &RemoteId,
    ) -> Result<RemoteFile> {
        let item = NewItem {
            name: local.name().to_string(),
            parent: parent.clone(),
            mime_type: Some(FOLDER_MIME_TYPE.to_string()),
            modified: Some(local.modified),
            app_properties: sync_item_properties(root_id),
        };

        if self.options.dry_run {
            return Ok(RemoteFile {
                id: RemoteId::dry_run(),
                rel_path: local.rel_path.clone(),
                name: item.name,
                size: 0,
                md5: None,
                modified: local.modified,
                created: None,
                mime_type: FOLDER_MIME_TYPE.to_string(),
                is_dir: true,
                parents: vec![item.parent],
                app_properties: item.app_properties,
            });
        }

        let created = with_retry("create_folder", || self.remote.create_folder(item.clone()))
            .await
            .context("Failed to create directory")?;
        debug!(id = %created.id, "Remote directory created");
        Ok(created.with_rel_path(local.rel_path.clone()))
    }

    /// Upload a local file that has no remote counterpart
    #[instrument(skip(self, local), fields(path = %local.rel_path, size = local.size))]
    pub async fn upload_file(
        &self,
        local: &LocalFile,
        parent: &RemoteId,
        root_id: &RemoteId,
    ) -> Result<()> {
        if self.options.dry_run {
            return Ok(());
        }

        let item = NewItem {
            name: local.name().to_string(),
            parent: parent.clone(),
            mime_type: None,
            modified: Some(local.modified),
            app_properties: sync_item_properties(root_id),
        };

        let item = &item;
        with_retry("upload_file", || async move {
            let idle = IdleTimeout::new(self.options.timeout);
            let reader = self
                .fs
                .open_read(&local.path)
                .await
                .context("Failed to open file")?;
            let upload = Upload {
                reader: self.instrument(reader, local.size, &idle),
                size: local.size,
                chunk_size: self.options.chunk_size,
                modified: Some(local.modified),
            };
            idle.guard(self.remote.create_file(item.clone(), upload)).await
        })
        .await
        .context("Failed to upload file")?;
        Ok(())
    }

    /// Replace remote content with the local version
    #[instrument(skip(self, changed), fields(path = %changed.rel_path()))]
    pub async fn update_file(&self, changed: &ChangedFile) -> Result<()> {
        if self.options.dry_run {
            return Ok(());
        }

        let local = &changed.local;
        with_retry("update_file", || async move {
            let idle = IdleTimeout::new(self.options.timeout);
            let reader = self
                .fs
                .open_read(&local.path)
                .await
                .context("Failed to open file")?;
            let upload = Upload {
                reader: self.instrument(reader, local.size, &idle),
                size: local.size,
                chunk_size: self.options.chunk_size,
                modified: Some(local.modified),
            };
            idle.guard(self.remote.update_file(&changed.remote.id, upload))
                .await
        })
        .await
        .context("Failed to update file")?;
        Ok(())
    }

    #[instrument(skip(self, remote), fields(path = %remote.rel_path, id = %remote.id))]
    pub async fn delete_remote(&self, remote: &RemoteFile) -> Result<()> {
        if self.options.dry_run {
            return Ok(());
        }

        with_retry("delete", || self.remote.delete(&remote.id))
            .await
            .context("Failed to delete file")
    }

    // ========================================================================
    // Local side
    // ========================================================================

    /// Create the local counterpart of a remote directory
    pub async fn create_local_dir(&self, remote: &RemoteFile, path: SyncPath) -> Result<LocalFile> {
        if !self.options.dry_run {
            self.fs
                .create_directory(&path)
                .await
                .context("Failed to create directory")?;
        }

        Ok(LocalFile {
            path,
            rel_path: remote.rel_path.clone(),
            size: 0,
            modified: Utc::now(),
            is_dir: true,
        })
    }

    /// Download a remote file over `dest`; returns the number of bytes written
    #[instrument(skip(self, remote), fields(path = %remote.rel_path, size = remote.size))]
    pub async fn download_file(&self, remote: &RemoteFile, dest: &SyncPath) -> Result<u64> {
        if self.options.dry_run {
            return Ok(0);
        }

        with_retry("download_file", || async move {
            let idle = IdleTimeout::new(self.options.timeout);
            idle.guard(async {
                let reader = self.remote.download(&remote.id).await?;
                let reader = self.instrument(reader, remote.size, &idle);
                self.fs.write_from(dest, reader).await
            })
            .await
        })
        .await
        .context("Failed to download file")
    }

    pub async fn delete_local(&self, local: &LocalFile) -> Result<()> {
        if self.options.dry_run {
            return Ok(());
        }

        self.fs
            .remove(&local.path)
            .await
            .context("Failed to delete file")
    }
}
