//! Local filesystem adapter (secondary/driven adapter)
//!
//! Implements [`ILocalFileSystem`] using `tokio::fs` for async file operations.
//!
//! ## Design Decisions
//!
//! - **Atomic writes**: `write_from` streams into a hidden temporary file next
//!   to the destination and renames it into place. The temporary file is
//!   removed on drop, so a failed or cancelled download leaves nothing behind.
//! - **MD5**: fingerprints are computed by streaming the file through
//!   `md5::Context` in fixed-size blocks.
//! - **Walk order**: entries are sorted by name and directories are yielded
//!   before their children.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, instrument};

use drivesync_core::domain::{Fingerprint, LocalFile, SyncPath};
use drivesync_core::ports::{ContentReader, FileMetadata, ILocalFileSystem};

/// Read buffer size for hashing
const HASH_BUFFER_SIZE: usize = 64 * 1024;

// ============================================================================
// LocalFileSystemAdapter struct
// ============================================================================

/// Adapter that bridges the [`ILocalFileSystem`] port to the real filesystem.
///
/// This is a zero-sized struct because all operations derive their context
/// from the [`SyncPath`] arguments.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystemAdapter;

impl LocalFileSystemAdapter {
    /// Create a new `LocalFileSystemAdapter`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Recursively walks `dir`, appending entries relative to `root`
    fn walk_directory<'a>(
        &'a self,
        dir: &'a SyncPath,
        root: &'a SyncPath,
        entries: &'a mut Vec<LocalFile>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut read_dir = tokio::fs::read_dir(dir.as_path())
                .await
                .with_context(|| format!("Failed to read directory: {}", dir))?;

            let mut children = Vec::new();
            while let Some(entry) = read_dir.next_entry().await? {
                children.push(entry.path());
            }
            children.sort();

            for child in children {
                let path = SyncPath::new(child)?;
                // follows symlinks
                let metadata = tokio::fs::metadata(path.as_path())
                    .await
                    .with_context(|| format!("Failed to stat {}", path))?;
                let rel_path = path.relative_to(root)?;
                let is_dir = metadata.is_dir();

                entries.push(LocalFile {
                    path: path.clone(),
                    rel_path,
                    size: if is_dir { 0 } else { metadata.len() },
                    modified: modified_time(&metadata),
                    is_dir,
                });

                if is_dir {
                    self.walk_directory(&path, root, entries).await?;
                }
            }

            Ok(())
        })
    }
}

/// Convert the system modification time to `DateTime<Utc>` with nanosecond precision
fn modified_time(metadata: &std::fs::Metadata) -> DateTime<Utc> {
    metadata
        .modified()
        .ok()
        .and_then(|st| st.duration_since(UNIX_EPOCH).ok())
        .and_then(|dur| DateTime::from_timestamp(dur.as_secs() as i64, dur.subsec_nanos()))
        .unwrap_or_default()
}

/// `.<name>.` so a temporary file sorts next to its destination
fn tmp_prefix(path: &SyncPath) -> OsString {
    let mut prefix = OsString::from(".");
    if let Some(name) = path.as_path().file_name() {
        prefix.push(name);
        prefix.push(".");
    }
    prefix
}

// ============================================================================
// ILocalFileSystem implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalFileSystem for LocalFileSystemAdapter {
    #[instrument(skip(self), fields(root = %root))]
    async fn walk(&self, root: &SyncPath) -> Result<Vec<LocalFile>> {
        let mut entries = Vec::new();
        self.walk_directory(root, root, &mut entries).await?;
        debug!(entries = entries.len(), "walk complete");
        Ok(entries)
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn stat(&self, path: &SyncPath) -> Result<Option<FileMetadata>> {
        let metadata = match tokio::fs::metadata(path.as_path()).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("path not found");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Some(FileMetadata {
            size: metadata.len(),
            modified: modified_time(&metadata),
            is_dir: metadata.is_dir(),
        }))
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn open_read(&self, path: &SyncPath) -> Result<ContentReader> {
        let file = tokio::fs::File::open(path.as_path()).await?;
        Ok(Box::new(file))
    }

    #[instrument(skip(self, reader), fields(path = %path))]
    async fn write_from(&self, path: &SyncPath, mut reader: ContentReader) -> Result<u64> {
        let target = path.as_path();
        let parent = target
            .parent()
            .with_context(|| format!("No parent directory for {}", path))?;
        tokio::fs::create_dir_all(parent).await?;

        // Removed on drop unless persisted, including when this future is cancelled
        let tmp = tempfile::Builder::new()
            .prefix(&tmp_prefix(path))
            .suffix(".tmp")
            .tempfile_in(parent)
            .with_context(|| format!("Failed to create temporary file in {}", parent.display()))?;
        debug!(tmp = %tmp.path().display(), "writing to temporary file");

        let mut file = tokio::fs::File::from_std(tmp.reopen()?);
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        debug!(bytes = written, "renaming temporary file to target");
        tmp.persist(target)
            .with_context(|| format!("Failed to move temporary file to {}", path))?;
        Ok(written)
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn create_directory(&self, path: &SyncPath) -> Result<()> {
        debug!("creating directory");
        tokio::fs::create_dir_all(path.as_path()).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn remove(&self, path: &SyncPath) -> Result<()> {
        let p = path.as_path();
        let metadata = tokio::fs::symlink_metadata(p).await?;

        if metadata.is_dir() {
            debug!("removing directory recursively");
            tokio::fs::remove_dir_all(p).await?;
        } else {
            debug!("removing file");
            tokio::fs::remove_file(p).await?;
        }
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn compute_fingerprint(&self, path: &SyncPath) -> Result<Fingerprint> {
        let mut file = tokio::fs::File::open(path.as_path()).await?;
        let mut context = md5::Context::new();
        let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

        loop {
            let n = file.read(&mut buffer).await?;
            if n == 0 {
                break;
            }
            context.consume(&buffer[..n]);
        }

        let fingerprint = Fingerprint::from_digest(context.compute().0);
        debug!(md5 = %fingerprint, "fingerprint computed");
        Ok(fingerprint)
    }
}

// ============================================================================
// Unit tests
// ============================================================================
