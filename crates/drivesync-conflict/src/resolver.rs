//! Per-file conflict resolution
//!
//! Decides, for one changed file, whether the transfer proceeds or is
//! skipped. A conflict exists only when the destination copy is strictly
//! newer than the source copy; otherwise the source always wins.

use serde::Serialize;
use tracing::debug;

use drivesync_core::domain::{ChangedFile, ConflictResolution, SyncDirection};

pub const REASON_KEEP_REMOTE: &str = "conflicting file, keeping remote file";
pub const REASON_REMOTE_LARGEST: &str = "conflicting file, remote file is largest, keeping remote";
pub const REASON_EQUAL_KEEP_REMOTE: &str = "conflicting file, file sizes are equal, keeping remote";
pub const REASON_KEEP_LOCAL: &str = "conflicting file, keeping local file";
pub const REASON_LOCAL_LARGEST: &str = "conflicting file, local file is largest, keeping local";
pub const REASON_EQUAL_KEEP_LOCAL: &str = "conflicting file, file sizes are equal, keeping local";
pub const REASON_UNHANDLED: &str = "conflicting file, unhandled case";

/// Outcome of [`check_conflict`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictDecision {
    pub skip: bool,
    /// Why the file is skipped; `None` when it proceeds
    pub reason: Option<&'static str>,
}

impl ConflictDecision {
    pub fn proceed() -> Self {
        Self {
            skip: false,
            reason: None,
        }
    }

    pub fn skip(reason: &'static str) -> Self {
        Self {
            skip: true,
            reason: Some(reason),
        }
    }
}

/// Returns true when the destination copy of `changed` is newer than the source
pub fn is_conflict(changed: &ChangedFile, direction: SyncDirection) -> bool {
    match direction {
        SyncDirection::Upload => changed.remote_newer(),
        SyncDirection::Download => changed.local_newer(),
    }
}

/// Decide whether the transfer of one changed file proceeds
///
/// With [`ConflictResolution::None`] the caller is expected to have aborted
/// the run already; if asked anyway the file is skipped as unhandled.
pub fn check_conflict(
    changed: &ChangedFile,
    resolution: ConflictResolution,
    direction: SyncDirection,
) -> ConflictDecision {
    if !is_conflict(changed, direction) {
        return ConflictDecision::proceed();
    }

    let decision = match direction {
        SyncDirection::Upload => resolve_upload(changed, resolution),
        SyncDirection::Download => resolve_download(changed, resolution),
    };

    debug!(
        path = %changed.rel_path(),
        resolution = %resolution,
        direction = %direction,
        skip = decision.skip,
        "Conflict resolved"
    );

    decision
}

fn resolve_upload(changed: &ChangedFile, resolution: ConflictResolution) -> ConflictDecision {
    match resolution {
        ConflictResolution::KeepLocal => ConflictDecision::proceed(),
        ConflictResolution::KeepRemote => ConflictDecision::skip(REASON_KEEP_REMOTE),
        ConflictResolution::KeepLargest if changed.remote_larger() => {
            ConflictDecision::skip(REASON_REMOTE_LARGEST)
        }
        ConflictResolution::KeepLargest if changed.local_larger() => ConflictDecision::proceed(),
        ConflictResolution::KeepLargest => ConflictDecision::skip(REASON_EQUAL_KEEP_REMOTE),
        ConflictResolution::None => ConflictDecision::skip(REASON_UNHANDLED),
    }
}

fn resolve_download(changed: &ChangedFile, resolution: ConflictResolution) -> ConflictDecision {
    match resolution {
        ConflictResolution::KeepRemote => ConflictDecision::proceed(),
        ConflictResolution::KeepLocal => ConflictDecision::skip(REASON_KEEP_LOCAL),
        ConflictResolution::KeepLargest if changed.local_larger() => {
            ConflictDecision::skip(REASON_LOCAL_LARGEST)
        }
        ConflictResolution::KeepLargest if changed.remote_larger() => ConflictDecision::proceed(),
        ConflictResolution::KeepLargest => ConflictDecision::skip(REASON_EQUAL_KEEP_LOCAL),
        ConflictResolution::None => ConflictDecision::skip(REASON_UNHANDLED),
    }
}
