//! Remote storage port (driven/secondary port)
//!
//! This module defines the interface the sync engine uses to talk to the
//! cloud storage service. The concrete adapter speaks the Drive v3 REST API.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific.
//!   Adapters attach a [`RemoteError`] to the chain so the engine can decide
//!   whether a failure is transient without knowing HTTP details.
//! - Content is streamed through `AsyncRead` in both directions so transfers
//!   can be wrapped for progress and idle-timeout tracking.
//! - Adapters return `RemoteFile`s with `rel_path` set to the root; the tree
//!   enumerator computes real relative paths from the parent chain.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncRead;

use crate::domain::files::RemoteFile;
use crate::domain::newtypes::RemoteId;

/// Streaming file content
pub type ContentReader = Box<dyn AsyncRead + Send + Unpin>;

// ============================================================================
// Remote errors
// ============================================================================

/// Coarse classification of a failed remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    /// HTTP 403, the service asks the client to slow down
    RateLimited,
    /// HTTP 5xx
    ServerError,
    /// Everything else; never retried
    Other,
}

impl StatusCategory {
    /// Returns true for errors worth retrying after a backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, StatusCategory::RateLimited | StatusCategory::ServerError)
    }
}

/// Error reported by a remote storage adapter
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Rate limit exceeded ({status}): {message}")]
    RateLimited { status: u16, message: String },

    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The request never produced an HTTP status
    #[error("Transport error: {0}")]
    Transport(String),
}

impl RemoteError {
    /// Build the error matching an HTTP status code
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            403 => RemoteError::RateLimited { status, message },
            500..=599 => RemoteError::Backend { status, message },
            _ => RemoteError::Rejected { status, message },
        }
    }

    pub fn category(&self) -> StatusCategory {
        match self {
            RemoteError::RateLimited { .. } => StatusCategory::RateLimited,
            RemoteError::Backend { .. } => StatusCategory::ServerError,
            RemoteError::Rejected { .. } | RemoteError::Transport(_) => StatusCategory::Other,
        }
    }

    /// HTTP status, if the request got that far
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::RateLimited { status, .. }
            | RemoteError::Backend { status, .. }
            | RemoteError::Rejected { status, .. } => Some(*status),
            RemoteError::Transport(_) => None,
        }
    }
}

/// Find the [`RemoteError`] category anywhere in an error chain
///
/// Errors without a `RemoteError` are classified as [`StatusCategory::Other`].
pub fn classify(err: &anyhow::Error) -> StatusCategory {
    err.chain()
        .find_map(|e| e.downcast_ref::<RemoteError>())
        .map(RemoteError::category)
        .unwrap_or(StatusCategory::Other)
}

// ============================================================================
// DTOs
// ============================================================================

/// One page of a children listing
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub files: Vec<RemoteFile>,
    /// Token for the next page; `None` on the last page
    pub next_page_token: Option<String>,
}

/// Metadata for an object about to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub name: String,
    pub parent: RemoteId,
    /// Explicit mime type; `None` lets the service detect it
    pub mime_type: Option<String>,
    /// Modification time to record remotely
    pub modified: Option<DateTime<Utc>>,
    pub app_properties: HashMap<String, String>,
}

/// File content to send to the service
pub struct Upload {
    pub reader: ContentReader,
    /// Total number of bytes the reader will yield
    pub size: u64,
    /// Preferred request chunk size in bytes
    pub chunk_size: u64,
    /// Modification time to record on an update
    pub modified: Option<DateTime<Utc>>,
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("size", &self.size)
            .field("chunk_size", &self.chunk_size)
            .field("modified", &self.modified)
            .finish_non_exhaustive()
    }
}

/// Storage quota of the account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    /// Total capacity in bytes; 0 means unlimited
    pub limit: u64,
    /// Bytes in use
    pub usage: u64,
}

impl Quota {
    pub fn is_unlimited(&self) -> bool {
        self.limit == 0
    }

    /// Free bytes, or `None` when the quota is unlimited
    pub fn free(&self) -> Option<u64> {
        if self.is_unlimited() {
            None
        } else {
            Some(self.limit.saturating_sub(self.usage))
        }
    }
}

// ============================================================================
// IRemoteStorage trait
// ============================================================================

/// Port trait for remote storage operations
///
/// ## Implementation Notes
///
/// - `list_children` must exclude trashed items.
/// - `create_file` and `update_file` consume the reader in `upload` exactly once.
/// - `download` returns a reader over the raw bytes of a binary file; native
///   documents without a fingerprint cannot be downloaded.
#[async_trait::async_trait]
pub trait IRemoteStorage: Send + Sync {
    /// Fetch metadata for a single object
    async fn get_file(&self, id: &RemoteId) -> anyhow::Result<RemoteFile>;

    /// List one page of the direct children of a directory
    async fn list_children(
        &self,
        parent: &RemoteId,
        page_token: Option<&str>,
    ) -> anyhow::Result<Page>;

    /// Find every directory carrying the sync-root marker
    async fn find_sync_roots(&self) -> anyhow::Result<Vec<RemoteFile>>;

    /// Create a directory
    async fn create_folder(&self, item: NewItem) -> anyhow::Result<RemoteFile>;

    /// Create a file from streamed content
    async fn create_file(&self, item: NewItem, upload: Upload) -> anyhow::Result<RemoteFile>;

    /// Replace the content of an existing file, keeping its id
    async fn update_file(&self, id: &RemoteId, upload: Upload) -> anyhow::Result<RemoteFile>;

    /// Merge app properties into an object
    async fn set_properties(
        &self,
        id: &RemoteId,
        properties: HashMap<String, String>,
    ) -> anyhow::Result<RemoteFile>;

    /// Permanently delete an object
    async fn delete(&self, id: &RemoteId) -> anyhow::Result<()>;

    /// Stream the content of a binary file
    async fn download(&self, id: &RemoteId) -> anyhow::Result<ContentReader>;

    /// Storage quota of the account
    async fn quota(&self) -> anyhow::Result<Quota>;
}
