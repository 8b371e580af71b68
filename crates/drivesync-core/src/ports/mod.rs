//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync engine
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStorage`] - Cloud storage operations (Drive v3)
//! - [`ILocalFileSystem`] - Local filesystem walking and streaming I/O
//! - [`ISyncReporter`] - Progress reporting for sync runs

pub mod local_filesystem;
pub mod remote_storage;
pub mod reporter;

pub use local_filesystem::{FileMetadata, ILocalFileSystem};
pub use remote_storage::{
    classify, ContentReader, IRemoteStorage, NewItem, Page, Quota, RemoteError, StatusCategory,
    Upload,
};
pub use reporter::{ISyncReporter, NullReporter, ProgressFn, SyncAction, SyncEvent};
