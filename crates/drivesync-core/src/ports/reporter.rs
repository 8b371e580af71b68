//! Sync progress reporting port (driven/secondary port)
//!
//! The engine emits one [`SyncEvent`] per step of a run. Adapters decide how
//! to render them: the CLI prints human-readable lines or JSON objects.
//!
//! ## Design Notes
//!
//! - Reporting is synchronous and infallible; a reporter that cannot write
//!   must not abort the sync.
//! - `Display` on `SyncEvent` yields the canonical human-readable line.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::domain::units::format_elapsed;

/// A single numbered step of a transfer phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SyncAction {
    CreateDirectory { path: String },
    Upload { source: String, destination: String },
    Update { source: String, destination: String },
    Download { source: String, destination: String },
    Skip { path: String, reason: String },
    Delete { path: String },
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::CreateDirectory { path } => write!(f, "Creating directory {path}"),
            SyncAction::Upload {
                source,
                destination,
            } => write!(f, "Uploading {source} -> {destination}"),
            SyncAction::Update {
                source,
                destination,
            } => write!(f, "Updating {source} -> {destination}"),
            SyncAction::Download {
                source,
                destination,
            } => write!(f, "Downloading {source} -> {destination}"),
            SyncAction::Skip { path, reason } => write!(f, "Skipping {path} ({reason})"),
            SyncAction::Delete { path } => write!(f, "Deleting {path}"),
        }
    }
}

/// Progress event emitted by the sync engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    Started,
    Collecting,
    Found {
        local: usize,
        remote: usize,
    },
    /// A transfer phase with `count` items begins
    PhaseStarted {
        heading: String,
        count: usize,
    },
    Action {
        index: usize,
        total: usize,
        #[serde(flatten)]
        action: SyncAction,
    },
    Finished {
        #[serde(serialize_with = "secs")]
        elapsed: Duration,
    },
}

fn secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncEvent::Started => write!(f, "Starting sync..."),
            SyncEvent::Collecting => write!(f, "Collecting local and remote file information..."),
            SyncEvent::Found { local, remote } => {
                write!(f, "Found {local} local files and {remote} remote files")
            }
            SyncEvent::PhaseStarted { heading, count } => write!(f, "\n{count} {heading}"),
            SyncEvent::Action {
                index,
                total,
                action,
            } => write!(f, "[{index:04}/{total:04}] {action}"),
            SyncEvent::Finished { elapsed } => {
                write!(f, "Sync finished in {}", format_elapsed(*elapsed))
            }
        }
    }
}

/// Byte-level progress callback: `(bytes_transferred, total)`
pub type ProgressFn = std::sync::Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Port trait for sync progress reporting
pub trait ISyncReporter: Send + Sync {
    /// Receive one event
    fn report(&self, event: &SyncEvent);

    /// Byte progress callback for individual transfers, if wanted
    fn progress(&self) -> Option<ProgressFn> {
        None
    }
}

/// Reporter that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullReporter;

impl ISyncReporter for NullReporter {
    fn report(&self, _event: &SyncEvent) {}
}
