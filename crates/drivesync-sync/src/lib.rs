//! drivesync Sync - Two-way directory synchronization engine
//!
//! Provides:
//! - Tree enumeration of a local directory and a remote sync root
//! - Classification into missing, changed and extraneous entries
//! - MD5-based change detection with an optional persistent cache
//! - Transfers with bounded retry and idle-timeout cancellation
//! - Upload and download sync runs driven by a phase state machine
//!
//! ## Modules
//!
//! - [`engine`] - Sync orchestrator for upload and download runs
//! - [`classifier`] - Pure set operations over both trees
//! - [`comparer`] / [`cache`] - Content change detection
//! - [`enumerator`] - Local and remote tree walks
//! - [`transfer`] - Mutations with retry and idle timeout
//! - [`filesystem`] - Local filesystem adapter (atomic writes, MD5)
//! - [`ignore`] - Glob patterns excluding local paths from a run

pub mod cache;
pub mod classifier;
pub mod comparer;
pub mod engine;
pub mod enumerator;
pub mod filesystem;
pub mod ignore;
pub mod retry;
pub mod timeout;
pub mod transfer;

use std::path::PathBuf;
use std::time::Duration;

use drivesync_core::domain::format_size;
use thiserror::Error;

pub use cache::FileCache;
pub use comparer::{CachedComparer, DirectComparer, FileComparer};
pub use engine::{DownloadSyncArgs, SyncEngine, UploadSyncArgs};
pub use filesystem::LocalFileSystemAdapter;

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote root id does not point to a directory
    #[error("Provided root id is not a directory")]
    RootNotDirectory,

    /// First use of a root requires an empty directory
    #[error("Root directory is not empty, the initial sync requires an empty directory")]
    RootNotEmpty,

    /// Download runs require a root carrying the sync-root marker
    #[error("Provided id is not a sync root directory")]
    NotSyncRoot,

    /// The local sync root exists but is not a directory
    #[error("Local path is not a directory: {0}")]
    LocalRootNotDirectory(PathBuf),

    /// The run index has no directory to create an entry in
    #[error("Could not find remote directory with path '{0}'")]
    ParentNotFound(String),

    /// Two remote entries in one directory share a name
    #[error("Found name collision between {path} ({first} and {second})")]
    NameCollision {
        path: String,
        first: String,
        second: String,
    },

    /// The remote quota cannot hold the files about to be uploaded
    #[error("Not enough free space, have {} need {}", size(.available), size(.required))]
    InsufficientSpace { available: u64, required: u64 },

    /// A transfer made no progress for the configured idle timeout
    #[error("timeout, no data was transferred for {}", humanize(.timeout))]
    Timeout { timeout: Duration },

    /// Upload chunk size does not fit in memory addressing
    #[error("Chunk size is too big, max chunk size for this computer is {max}")]
    ChunkSizeTooBig { max: u64 },

    /// An I/O error occurred during file operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A domain-level error propagated from drivesync-core
    #[error("Domain error: {0}")]
    DomainError(#[from] drivesync_core::domain::errors::DomainError),
}

fn size(bytes: &u64) -> String {
    format_size(*bytes, false)
}

fn humanize(timeout: &Duration) -> String {
    let secs = timeout.as_secs();
    if secs >= 60 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}
