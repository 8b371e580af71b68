//! Error types for conflict handling

use drivesync_core::domain::SyncDirection;
use thiserror::Error;

/// Errors that can occur during conflict detection and resolution
#[derive(Debug, Error)]
pub enum ConflictError {
    /// Conflicting files were found and no resolution policy was given
    #[error(
        "Conflict detected!\nThe following files have changed and the {} file are newer than it's {} counterpart:\n\n{report}\nNo conflict resolution was given, aborting...",
        newer_side(.direction),
        older_side(.direction)
    )]
    Unresolved {
        direction: SyncDirection,
        /// Number of conflicting files
        count: usize,
        /// Table listing every conflicting file
        report: String,
    },

    /// More than one resolution flag was given
    #[error("Only one conflict resolution flag can be given")]
    AmbiguousResolution,

    /// Configured default strategy is not recognised
    #[error("invalid conflict strategy '{0}'; valid: none, keep_local, keep_remote, keep_largest")]
    InvalidStrategy(String),
}

fn newer_side(direction: &SyncDirection) -> &'static str {
    match direction {
        SyncDirection::Upload => "remote",
        SyncDirection::Download => "local",
    }
}

fn older_side(direction: &SyncDirection) -> &'static str {
    match direction {
        SyncDirection::Upload => "local",
        SyncDirection::Download => "remote",
    }
}
