//! Sync Engine - Orchestrates upload and download sync runs
//!
//! A run walks the phases of [`SyncState`](drivesync_core::domain::SyncState) in order:
//! 1. Prepare the remote root (and the local root for downloads)
//! 2. Enumerate both trees
//! 3. Classify entries into missing, changed and extraneous
//! 4. Check free space on the destination (uploads only)
//! 5. Abort on conflicts unless a resolution policy is set
//! 6. Create missing directories, shallowest first
//! 7. Transfer missing files
//! 8. Transfer changed files, or skip them per the conflict policy
//! 9. Delete extraneous entries, deepest first, when requested
//!
//! Any error aborts the run at the phase it occurred in. Mutations already
//! performed are not rolled back; the next run picks up where this one
//! stopped.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, error, info};

use drivesync_conflict::{check_conflict, ensure_no_conflicts};
use drivesync_core::domain::files::sync_root_properties;
use drivesync_core::domain::{
    ConflictResolution, RelPath, RemoteFile, RemoteId, SyncDirection, SyncFiles, SyncPath,
    SyncRun, SyncSummary,
};
use drivesync_core::ports::{
    ILocalFileSystem, IRemoteStorage, ISyncReporter, SyncAction, SyncEvent,
};

use crate::classifier::{classify_download, classify_upload};
use crate::comparer::FileComparer;
use crate::enumerator::{enumerate_local, enumerate_remote};
use crate::ignore::IgnoreRules;
use crate::retry::with_retry;
use crate::transfer::{TransferExecutor, TransferOptions};
use crate::SyncError;

/// Largest chunk size a single upload request buffer can hold
pub const MAX_CHUNK_SIZE: u64 = isize::MAX as u64 - 1;

// ============================================================================
// Run arguments
// ============================================================================

/// Arguments for a local-to-remote run
pub struct UploadSyncArgs {
    /// Absolute path of the local directory
    pub local_path: PathBuf,
    pub root_id: RemoteId,
    pub dry_run: bool,
    pub delete_extraneous: bool,
    pub resolution: ConflictResolution,
    /// Idle timeout per transfer; zero disables it
    pub timeout: Duration,
    pub chunk_size: u64,
    pub comparer: Arc<dyn FileComparer>,
    /// Name of the ignore file looked up in the local root
    pub ignore_file: String,
}

/// Arguments for a remote-to-local run
pub struct DownloadSyncArgs {
    pub root_id: RemoteId,
    /// Absolute path of the local directory; created when missing
    pub local_path: PathBuf,
    pub dry_run: bool,
    pub delete_extraneous: bool,
    pub resolution: ConflictResolution,
    pub timeout: Duration,
    pub comparer: Arc<dyn FileComparer>,
    pub ignore_file: String,
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Drives sync runs between a local directory and a remote sync root
pub struct SyncEngine {
    remote: Arc<dyn IRemoteStorage>,
    fs: Arc<dyn ILocalFileSystem>,
    reporter: Arc<dyn ISyncReporter>,
}

impl SyncEngine {
    pub fn new(
        remote: Arc<dyn IRemoteStorage>,
        fs: Arc<dyn ILocalFileSystem>,
        reporter: Arc<dyn ISyncReporter>,
    ) -> Self {
        Self {
            remote,
            fs,
            reporter,
        }
    }

    fn report(&self, event: SyncEvent) {
        self.reporter.report(&event);
    }

    fn phase(&self, heading: &str, count: usize) {
        if count > 0 {
            self.report(SyncEvent::PhaseStarted {
                heading: heading.to_string(),
                count,
            });
        }
    }

    fn action(&self, index: usize, total: usize, action: SyncAction) {
        self.report(SyncEvent::Action {
            index: index + 1,
            total,
            action,
        });
    }

    fn transfers(&self, dry_run: bool, timeout: Duration, chunk_size: u64) -> TransferExecutor {
        TransferExecutor::new(
            Arc::clone(&self.remote),
            Arc::clone(&self.fs),
            TransferOptions {
                dry_run,
                timeout,
                chunk_size,
            },
            self.reporter.progress(),
        )
    }

    // ========================================================================
    // Upload
    // ========================================================================

    /// Make the remote tree under `root_id` mirror a local directory
    pub async fn upload_sync(&self, args: UploadSyncArgs) -> Result<SyncSummary> {
        let mut run = SyncRun::new(SyncDirection::Upload);
        match self.run_upload(&mut run, &args).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                error!(state = %run.state(), error = %format!("{e:#}"), "Upload sync aborted");
                run.abort();
                Err(e)
            }
        }
    }

    async fn run_upload(&self, run: &mut SyncRun, args: &UploadSyncArgs) -> Result<SyncSummary> {
        if args.chunk_size > MAX_CHUNK_SIZE {
            return Err(SyncError::ChunkSizeTooBig { max: MAX_CHUNK_SIZE }.into());
        }

        let started = Instant::now();
        let mut summary = SyncSummary {
            dry_run: args.dry_run,
            ..Default::default()
        };
        info!(
            local = %args.local_path.display(),
            root_id = %args.root_id,
            dry_run = args.dry_run,
            "Starting upload sync"
        );
        self.report(SyncEvent::Started);

        // Preparing root
        let local_root = self.require_local_dir(&args.local_path).await?;
        let root = self.prepare_sync_root(&args.root_id, args.dry_run).await?;

        run.advance()?; // Enumerating
        self.report(SyncEvent::Collecting);
        let ignore = IgnoreRules::load(local_root.as_path(), &args.ignore_file).await?;
        let local = enumerate_local(self.fs.as_ref(), &local_root, &ignore).await?;
        let remote = enumerate_remote(self.remote.as_ref(), &root).await?;
        let mut files = SyncFiles::new(root, local, remote);
        self.report(SyncEvent::Found {
            local: files.local().len(),
            remote: files.remote().len(),
        });

        run.advance()?; // Classifying
        let plan = classify_upload(&files, args.comparer.as_ref()).await?;
        debug!(
            missing_dirs = plan.missing_dirs.len(),
            missing_files = plan.missing_files.len(),
            changed = plan.changed.len(),
            extraneous = plan.extraneous.len(),
            "Upload plan ready"
        );

        run.advance()?; // CheckingSpace
        self.ensure_enough_space(plan.required_bytes()).await?;

        run.advance()?; // CheckingConflicts
        ensure_no_conflicts(&plan.changed, args.resolution, SyncDirection::Upload)?;

        let transfers = self.transfers(args.dry_run, args.timeout, args.chunk_size);
        let root_id = files.root().id.clone();
        let root_name = files.root().name.clone();

        run.advance()?; // CreatingDirs
        let total = plan.missing_dirs.len();
        self.phase("remote directories are missing", total);
        for (i, dir) in plan.missing_dirs.iter().enumerate() {
            let parent = remote_parent_id(&files, &dir.rel_path)?;
            self.action(
                i,
                total,
                SyncAction::CreateDirectory {
                    path: format!("{root_name}/{}", dir.rel_path),
                },
            );
            let created = transfers.create_remote_dir(dir, &parent, &root_id).await?;
            files.insert_remote(created);
            summary.dirs_created += 1;
        }

        run.advance()?; // UploadingMissing
        let total = plan.missing_files.len();
        self.phase("remote files are missing", total);
        for (i, file) in plan.missing_files.iter().enumerate() {
            let parent = remote_parent_id(&files, &file.rel_path)?;
            self.action(
                i,
                total,
                SyncAction::Upload {
                    source: file.rel_path.to_string(),
                    destination: format!("{root_name}/{}", file.rel_path),
                },
            );
            transfers.upload_file(file, &parent, &root_id).await?;
            summary.files_transferred += 1;
            summary.bytes_transferred += file.size;
        }

        run.advance()?; // UpdatingChanged
        let total = plan.changed.len();
        self.phase("local files has changed", total);
        for (i, changed) in plan.changed.iter().enumerate() {
            let decision = check_conflict(changed, args.resolution, SyncDirection::Upload);
            if let Some(reason) = decision.reason.filter(|_| decision.skip) {
                self.action(
                    i,
                    total,
                    SyncAction::Skip {
                        path: changed.rel_path().to_string(),
                        reason: reason.to_string(),
                    },
                );
                summary.files_skipped += 1;
                continue;
            }

            self.action(
                i,
                total,
                SyncAction::Update {
                    source: changed.rel_path().to_string(),
                    destination: format!("{root_name}/{}", changed.rel_path()),
                },
            );
            transfers.update_file(changed).await?;
            summary.files_updated += 1;
            summary.bytes_transferred += changed.local.size;
        }

        run.advance()?; // DeletingExtraneous
        if args.delete_extraneous {
            let total = plan.extraneous.len();
            self.phase("remote files are extraneous", total);
            for (i, file) in plan.extraneous.iter().enumerate() {
                self.action(
                    i,
                    total,
                    SyncAction::Delete {
                        path: format!("{root_name}/{}", file.rel_path),
                    },
                );
                transfers.delete_remote(file).await?;
                summary.files_deleted += 1;
            }
        }

        run.advance()?; // Done
        summary.elapsed = started.elapsed();
        info!(
            actions = summary.total_actions(),
            skipped = summary.files_skipped,
            bytes = summary.bytes_transferred,
            "Upload sync finished"
        );
        self.report(SyncEvent::Finished {
            elapsed: summary.elapsed,
        });
        Ok(summary)
    }

    /// Check the remote root and mark it as a sync root on first use
    ///
    /// A root without the marker must be empty. In a dry run the marker is
    /// not written.
    async fn prepare_sync_root(&self, root_id: &RemoteId, dry_run: bool) -> Result<RemoteFile> {
        let root = with_retry("get_file", || self.remote.get_file(root_id))
            .await
            .context("Failed to find root dir")?;

        if !root.is_dir {
            return Err(SyncError::RootNotDirectory.into());
        }
        if root.is_sync_root() {
            return Ok(root);
        }

        let page = with_retry("list_children", || self.remote.list_children(root_id, None))
            .await
            .context("Failed to check if root dir is empty")?;
        if !page.files.is_empty() {
            return Err(SyncError::RootNotEmpty.into());
        }

        if dry_run {
            debug!(root_id = %root_id, "Dry run, not marking sync root");
            return Ok(root);
        }

        let marked = with_retry("set_properties", || {
            self.remote.set_properties(root_id, sync_root_properties())
        })
        .await
        .context("Failed to update root directory")?;
        info!(root_id = %root_id, "Directory marked as sync root");
        Ok(marked)
    }

    async fn ensure_enough_space(&self, required: u64) -> Result<()> {
        let quota = with_retry("quota", || self.remote.quota())
            .await
            .context("Failed to determine free space")?;

        match quota.free() {
            Some(available) if required > available => {
                Err(SyncError::InsufficientSpace {
                    available,
                    required,
                }
                .into())
            }
            _ => Ok(()),
        }
    }

    async fn require_local_dir(&self, path: &Path) -> Result<SyncPath> {
        let root = SyncPath::new(path.to_path_buf())?;
        match self.fs.stat(&root).await? {
            Some(meta) if meta.is_dir => Ok(root),
            _ => Err(SyncError::LocalRootNotDirectory(path.to_path_buf()).into()),
        }
    }

    // ========================================================================
    // Download
    // ========================================================================

    /// Make a local directory mirror the remote tree under `root_id`
    pub async fn download_sync(&self, args: DownloadSyncArgs) -> Result<SyncSummary> {
        let mut run = SyncRun::new(SyncDirection::Download);
        match self.run_download(&mut run, &args).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                error!(state = %run.state(), error = %format!("{e:#}"), "Download sync aborted");
                run.abort();
                Err(e)
            }
        }
    }

    async fn run_download(
        &self,
        run: &mut SyncRun,
        args: &DownloadSyncArgs,
    ) -> Result<SyncSummary> {
        let started = Instant::now();
        let mut summary = SyncSummary {
            dry_run: args.dry_run,
            ..Default::default()
        };
        info!(
            root_id = %args.root_id,
            local = %args.local_path.display(),
            dry_run = args.dry_run,
            "Starting download sync"
        );
        self.report(SyncEvent::Started);

        // Preparing root
        let root = self.get_sync_root(&args.root_id).await?;
        let local_root = SyncPath::new(args.local_path.clone())?;
        let local_exists = match self.fs.stat(&local_root).await? {
            Some(meta) if meta.is_dir => true,
            Some(_) => return Err(SyncError::LocalRootNotDirectory(args.local_path.clone()).into()),
            None if args.dry_run => false,
            None => {
                self.fs
                    .create_directory(&local_root)
                    .await
                    .context("Failed to create directory")?;
                true
            }
        };

        run.advance()?; // Enumerating
        self.report(SyncEvent::Collecting);
        let local = if local_exists {
            let ignore = IgnoreRules::load(local_root.as_path(), &args.ignore_file).await?;
            enumerate_local(self.fs.as_ref(), &local_root, &ignore).await?
        } else {
            Vec::new()
        };
        let remote = enumerate_remote(self.remote.as_ref(), &root).await?;
        let mut files = SyncFiles::new(root, local, remote);
        self.report(SyncEvent::Found {
            local: files.local().len(),
            remote: files.remote().len(),
        });

        run.advance()?; // Classifying
        let plan = classify_download(&files, args.comparer.as_ref()).await?;

        run.advance()?; // CheckingSpace
        debug!("Free space is not checked for downloads");

        run.advance()?; // CheckingConflicts
        ensure_no_conflicts(&plan.changed, args.resolution, SyncDirection::Download)?;

        let transfers = self.transfers(args.dry_run, args.timeout, 0);
        let root_name = files.root().name.clone();

        run.advance()?; // CreatingDirs
        let total = plan.missing_dirs.len();
        self.phase("local directories are missing", total);
        for (i, dir) in plan.missing_dirs.iter().enumerate() {
            let path = local_root.join_rel(&dir.rel_path);
            self.action(
                i,
                total,
                SyncAction::CreateDirectory {
                    path: path.to_string(),
                },
            );
            let created = transfers.create_local_dir(dir, path).await?;
            files.insert_local(created);
            summary.dirs_created += 1;
        }

        run.advance()?; // UploadingMissing
        let total = plan.missing_files.len();
        self.phase("local files are missing", total);
        for (i, file) in plan.missing_files.iter().enumerate() {
            let path = local_root.join_rel(&file.rel_path);
            self.action(
                i,
                total,
                SyncAction::Download {
                    source: format!("{root_name}/{}", file.rel_path),
                    destination: path.to_string(),
                },
            );
            let written = transfers.download_file(file, &path).await?;
            summary.files_transferred += 1;
            summary.bytes_transferred += if args.dry_run { file.size } else { written };
        }

        run.advance()?; // UpdatingChanged
        let total = plan.changed.len();
        self.phase("remote files has changed", total);
        for (i, changed) in plan.changed.iter().enumerate() {
            let decision = check_conflict(changed, args.resolution, SyncDirection::Download);
            if let Some(reason) = decision.reason.filter(|_| decision.skip) {
                self.action(
                    i,
                    total,
                    SyncAction::Skip {
                        path: changed.rel_path().to_string(),
                        reason: reason.to_string(),
                    },
                );
                summary.files_skipped += 1;
                continue;
            }

            self.action(
                i,
                total,
                SyncAction::Download {
                    source: format!("{root_name}/{}", changed.rel_path()),
                    destination: changed.local.path.to_string(),
                },
            );
            let written = transfers
                .download_file(&changed.remote, &changed.local.path)
                .await?;
            summary.files_updated += 1;
            summary.bytes_transferred += if args.dry_run {
                changed.remote.size
            } else {
                written
            };
        }

        run.advance()?; // DeletingExtraneous
        if args.delete_extraneous {
            let total = plan.extraneous.len();
            self.phase("local files are extraneous", total);
            for (i, file) in plan.extraneous.iter().enumerate() {
                self.action(
                    i,
                    total,
                    SyncAction::Delete {
                        path: file.path.to_string(),
                    },
                );
                transfers.delete_local(file).await?;
                summary.files_deleted += 1;
            }
        }

        run.advance()?; // Done
        summary.elapsed = started.elapsed();
        info!(
            actions = summary.total_actions(),
            skipped = summary.files_skipped,
            bytes = summary.bytes_transferred,
            "Download sync finished"
        );
        self.report(SyncEvent::Finished {
            elapsed: summary.elapsed,
        });
        Ok(summary)
    }

    /// Fetch a directory that already carries the sync-root marker
    async fn get_sync_root(&self, root_id: &RemoteId) -> Result<RemoteFile> {
        let root = with_retry("get_file", || self.remote.get_file(root_id))
            .await
            .context("Failed to find root dir")?;

        if !root.is_dir || !root.is_sync_root() {
            return Err(SyncError::NotSyncRoot.into());
        }
        Ok(root)
    }

    // ========================================================================
    // Listings
    // ========================================================================

    /// Every directory marked as a sync root
    pub async fn list_sync_roots(&self) -> Result<Vec<RemoteFile>> {
        with_retry("find_sync_roots", || self.remote.find_sync_roots())
            .await
            .context("Failed listing sync roots")
    }

    /// Everything below a sync root, sorted by relative path
    pub async fn list_sync_content(&self, root_id: &RemoteId) -> Result<Vec<RemoteFile>> {
        let root = self.get_sync_root(root_id).await?;
        let mut files = enumerate_remote(self.remote.as_ref(), &root).await?;
        files.sort_by(|a, b| a.rel_path.as_str().cmp(b.rel_path.as_str()));
        Ok(files)
    }
}

fn remote_parent_id(files: &SyncFiles, rel_path: &RelPath) -> Result<RemoteId> {
    files
        .find_remote_parent(rel_path)
        .map(|p| p.id.clone())
        .ok_or_else(|| {
            let parent = rel_path.parent().unwrap_or_else(RelPath::root);
            SyncError::ParentNotFound(parent.to_string()).into()
        })
}
