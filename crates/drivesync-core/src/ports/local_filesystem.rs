//! Local filesystem port (driven/secondary port)
//!
//! This module defines the interface for interacting with the local
//! filesystem: walking the sync root, streaming file content in and out,
//! and computing content fingerprints.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because filesystem errors are adapter-specific.
//! - `write_from` is atomic: content lands in a temporary sibling file that is
//!   renamed over the destination once complete.

use chrono::{DateTime, Utc};

use super::remote_storage::ContentReader;
use crate::domain::files::LocalFile;
use crate::domain::newtypes::{Fingerprint, SyncPath};

/// Metadata of a single path on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub is_dir: bool,
}

/// Port trait for local filesystem operations
///
/// ## Implementation Notes
///
/// - All paths are `SyncPath` instances, which are guaranteed to be absolute.
/// - `walk` yields directories before their children, with `rel_path`
///   relative to `root`. The root itself is not included.
/// - `compute_fingerprint` returns the MD5 of the file content.
#[async_trait::async_trait]
pub trait ILocalFileSystem: Send + Sync {
    /// Recursively list everything below `root`
    async fn walk(&self, root: &SyncPath) -> anyhow::Result<Vec<LocalFile>>;

    /// Metadata for a path, `None` if it does not exist
    async fn stat(&self, path: &SyncPath) -> anyhow::Result<Option<FileMetadata>>;

    /// Open a file for streaming reads
    async fn open_read(&self, path: &SyncPath) -> anyhow::Result<ContentReader>;

    /// Atomically replace `path` with everything read from `reader`
    ///
    /// Returns the number of bytes written.
    async fn write_from(&self, path: &SyncPath, reader: ContentReader) -> anyhow::Result<u64>;

    /// Create a directory and all missing parents
    async fn create_directory(&self, path: &SyncPath) -> anyhow::Result<()>;

    /// Remove a file, or a directory with everything in it
    async fn remove(&self, path: &SyncPath) -> anyhow::Result<()>;

    /// Compute the MD5 fingerprint of a file
    async fn compute_fingerprint(&self, path: &SyncPath) -> anyhow::Result<Fingerprint>;
}
