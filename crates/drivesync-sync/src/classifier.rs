//! Classification of both trees into transfer phases
//!
//! Entries are matched by relative path only. An entry that is a directory
//! on one side and a file on the other belongs to no category; it is logged
//! and left alone.

use anyhow::Result;
use tracing::warn;

use drivesync_core::domain::{ChangedFile, LocalFile, RemoteFile, SyncFiles};

use crate::comparer::FileComparer;

/// Work for an upload run
#[derive(Debug, Clone, Default)]
pub struct UploadPlan {
    /// Shallowest first
    pub missing_dirs: Vec<LocalFile>,
    pub missing_files: Vec<LocalFile>,
    pub changed: Vec<ChangedFile>,
    /// Deepest first
    pub extraneous: Vec<RemoteFile>,
}

impl UploadPlan {
    /// Bytes the remote side must be able to hold for this plan
    pub fn required_bytes(&self) -> u64 {
        let missing: u64 = self.missing_files.iter().map(|f| f.size).sum();
        let changed: u64 = self.changed.iter().map(|c| c.local.size).sum();
        missing + changed
    }
}

/// Work for a download run
#[derive(Debug, Clone, Default)]
pub struct DownloadPlan {
    /// Shallowest first
    pub missing_dirs: Vec<RemoteFile>,
    pub missing_files: Vec<RemoteFile>,
    pub changed: Vec<ChangedFile>,
    /// Deepest first
    pub extraneous: Vec<LocalFile>,
}

// ============================================================================
// Upload direction
// ============================================================================

/// Local directories with nothing at the same path remotely
pub fn missing_remote_dirs(files: &SyncFiles) -> Vec<LocalFile> {
    let mut dirs: Vec<LocalFile> = files
        .local()
        .iter()
        .filter(|f| f.is_dir && files.find_remote(&f.rel_path).is_none())
        .cloned()
        .collect();
    dirs.sort_by_key(|f| f.rel_path.depth());
    dirs
}

/// Local files with nothing at the same path remotely
pub fn missing_remote_files(files: &SyncFiles) -> Vec<LocalFile> {
    files
        .local()
        .iter()
        .filter(|f| !f.is_dir && files.find_remote(&f.rel_path).is_none())
        .cloned()
        .collect()
}

/// Local files whose remote counterpart has different content
pub async fn changed_local_files(
    files: &SyncFiles,
    comparer: &dyn FileComparer,
) -> Result<Vec<ChangedFile>> {
    let mut changed = Vec::new();
    for local in files.local() {
        let Some(remote) = files.find_remote(&local.rel_path) else {
            continue;
        };
        if local.is_dir != remote.is_dir {
            warn_type_mismatch(local, remote);
            continue;
        }
        if local.is_dir {
            continue;
        }
        if comparer.changed(local, remote).await? {
            changed.push(ChangedFile::new(local.clone(), remote.clone()));
        }
    }
    Ok(changed)
}

/// Remote entries with nothing at the same path locally
pub fn extraneous_remote_files(files: &SyncFiles) -> Vec<RemoteFile> {
    let mut extraneous: Vec<RemoteFile> = files
        .remote()
        .iter()
        .filter(|f| files.find_local(&f.rel_path).is_none())
        .cloned()
        .collect();
    extraneous.sort_by_key(|f| std::cmp::Reverse(f.rel_path.depth()));
    extraneous
}

/// Full plan for an upload run
pub async fn classify_upload(files: &SyncFiles, comparer: &dyn FileComparer) -> Result<UploadPlan> {
    Ok(UploadPlan {
        missing_dirs: missing_remote_dirs(files),
        missing_files: missing_remote_files(files),
        changed: changed_local_files(files, comparer).await?,
        extraneous: extraneous_remote_files(files),
    })
}

// ============================================================================
// Download direction
// ============================================================================

/// Remote directories with nothing at the same path locally
pub fn missing_local_dirs(files: &SyncFiles) -> Vec<RemoteFile> {
    let mut dirs: Vec<RemoteFile> = files
        .remote()
        .iter()
        .filter(|f| f.is_dir && files.find_local(&f.rel_path).is_none())
        .cloned()
        .collect();
    dirs.sort_by_key(|f| f.rel_path.depth());
    dirs
}

/// Remote binary files with nothing at the same path locally
///
/// Native documents have no downloadable content and are left out.
pub fn missing_local_files(files: &SyncFiles) -> Vec<RemoteFile> {
    files
        .remote()
        .iter()
        .filter(|f| !f.is_dir && f.is_binary() && files.find_local(&f.rel_path).is_none())
        .cloned()
        .collect()
}

/// Remote binary files whose local counterpart has different content
pub async fn changed_remote_files(
    files: &SyncFiles,
    comparer: &dyn FileComparer,
) -> Result<Vec<ChangedFile>> {
    let mut changed = Vec::new();
    for remote in files.remote() {
        let Some(local) = files.find_local(&remote.rel_path) else {
            continue;
        };
        if local.is_dir != remote.is_dir {
            warn_type_mismatch(local, remote);
            continue;
        }
        if remote.is_dir || !remote.is_binary() {
            continue;
        }
        if comparer.changed(local, remote).await? {
            changed.push(ChangedFile::new(local.clone(), remote.clone()));
        }
    }
    Ok(changed)
}

/// Local entries with nothing at the same path remotely
pub fn extraneous_local_files(files: &SyncFiles) -> Vec<LocalFile> {
    let mut extraneous: Vec<LocalFile> = files
        .local()
        .iter()
        .filter(|f| files.find_remote(&f.rel_path).is_none())
        .cloned()
        .collect();
    extraneous.sort_by_key(|f| std::cmp::Reverse(f.rel_path.depth()));
    extraneous
}

/// Full plan for a download run
pub async fn classify_download(
    files: &SyncFiles,
    comparer: &dyn FileComparer,
) -> Result<DownloadPlan> {
    Ok(DownloadPlan {
        missing_dirs: missing_local_dirs(files),
        missing_files: missing_local_files(files),
        changed: changed_remote_files(files, comparer).await?,
        extraneous: extraneous_local_files(files),
    })
}

fn warn_type_mismatch(local: &LocalFile, remote: &RemoteFile) {
    warn!(
        path = %local.rel_path,
        local_is_dir = local.is_dir,
        remote_is_dir = remote.is_dir,
        "Type mismatch between local and remote entry, skipping"
    );
}
