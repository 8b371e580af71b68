//! Domain entities and business logic
//!
//! This module contains the core domain types for drivesync:
//! - Newtypes for validated paths, identifiers and fingerprints
//! - Local and remote file snapshots and the per-run path index
//! - Conflict resolution policy and sync direction
//! - The sync run state machine and summary
//! - Size and text formatting helpers
//! - Domain-specific error types

pub mod conflict;
pub mod errors;
pub mod files;
pub mod newtypes;
pub mod session;
pub mod units;

// Re-export commonly used types
pub use conflict::{ConflictResolution, SyncDirection};
pub use errors::DomainError;
pub use files::{ChangedFile, LocalFile, RemoteFile, SyncFiles, FOLDER_MIME_TYPE};
pub use newtypes::*;
pub use session::{SyncRun, SyncState, SyncSummary};
pub use units::{format_datetime, format_elapsed, format_size, truncate_middle};
