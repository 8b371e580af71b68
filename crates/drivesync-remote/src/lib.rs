//! drivesync Remote - Google Drive v3 REST adapter
//!
//! Provides the async client the sync engine talks to through
//! [`IRemoteStorage`](drivesync_core::ports::IRemoteStorage):
//! - Metadata calls (get, list children, sync-root search, quota)
//! - Folder creation, app-property updates and deletion
//! - Resumable chunked uploads and streamed downloads
//!
//! ## Modules
//!
//! - [`client`] - Authenticated HTTP client and metadata endpoints
//! - [`files`] - Drive `File` resource mapping into domain types
//! - [`upload`] - Resumable upload sessions
//! - [`provider`] - [`DriveStorage`], the port implementation

pub mod client;
pub mod files;
pub mod provider;
pub mod upload;

pub use client::DriveClient;
pub use provider::DriveStorage;

use thiserror::Error;

/// Errors produced by the Drive adapter itself
///
/// HTTP failures are reported as
/// [`RemoteError`](drivesync_core::ports::RemoteError) so the engine can
/// classify them; these variants cover responses the adapter cannot use.
#[derive(Debug, Error)]
pub enum DriveError {
    /// A response was missing a field or carried a malformed value
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The service did not return a session URL for a resumable upload
    #[error("Upload session response has no Location header")]
    MissingUploadLocation,

    /// The service acknowledged a different byte count than was sent
    #[error("Upload stopped at byte {received}, expected {expected}")]
    IncompleteUpload { received: u64, expected: u64 },

    /// The content reader ended before the announced size was reached
    #[error("Content ended after {read} of {size} bytes")]
    ShortRead { read: u64, size: u64 },
}
