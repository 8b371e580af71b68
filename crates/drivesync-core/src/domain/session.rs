//! Sync run state machine
//!
//! Every run walks the same sequence of phases, in order:
//!
//! ```text
//! PreparingRoot -> Enumerating -> Classifying -> CheckingSpace -> CheckingConflicts
//!     -> CreatingDirs -> UploadingMissing -> UpdatingChanged -> DeletingExtraneous -> Done
//! ```
//!
//! `Aborted` is reachable from any non-terminal state. `Done` and `Aborted`
//! are terminal.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::conflict::SyncDirection;
use super::errors::DomainError;

// ============================================================================
// SyncState
// ============================================================================

/// Phase of a sync run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    PreparingRoot,
    Enumerating,
    Classifying,
    CheckingSpace,
    CheckingConflicts,
    CreatingDirs,
    /// Transfers missing files to the destination side
    UploadingMissing,
    UpdatingChanged,
    DeletingExtraneous,
    Done,
    Aborted,
}

impl SyncState {
    /// Returns the state name for display purposes
    pub fn name(&self) -> &'static str {
        match self {
            SyncState::PreparingRoot => "preparing_root",
            SyncState::Enumerating => "enumerating",
            SyncState::Classifying => "classifying",
            SyncState::CheckingSpace => "checking_space",
            SyncState::CheckingConflicts => "checking_conflicts",
            SyncState::CreatingDirs => "creating_dirs",
            SyncState::UploadingMissing => "uploading_missing",
            SyncState::UpdatingChanged => "updating_changed",
            SyncState::DeletingExtraneous => "deleting_extraneous",
            SyncState::Done => "done",
            SyncState::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncState::Done | SyncState::Aborted)
    }

    /// The state that follows this one on the success path
    pub fn next(&self) -> Option<SyncState> {
        match self {
            SyncState::PreparingRoot => Some(SyncState::Enumerating),
            SyncState::Enumerating => Some(SyncState::Classifying),
            SyncState::Classifying => Some(SyncState::CheckingSpace),
            SyncState::CheckingSpace => Some(SyncState::CheckingConflicts),
            SyncState::CheckingConflicts => Some(SyncState::CreatingDirs),
            SyncState::CreatingDirs => Some(SyncState::UploadingMissing),
            SyncState::UploadingMissing => Some(SyncState::UpdatingChanged),
            SyncState::UpdatingChanged => Some(SyncState::DeletingExtraneous),
            SyncState::DeletingExtraneous => Some(SyncState::Done),
            SyncState::Done | SyncState::Aborted => None,
        }
    }

    /// Checks if a transition is valid
    ///
    /// Valid transitions:
    /// - any non-terminal state -> its successor
    /// - any non-terminal state -> Aborted
    /// - Done, Aborted -> (terminal, no transitions)
    pub fn can_transition_to(&self, target: SyncState) -> bool {
        if self.is_terminal() {
            return false;
        }
        target == SyncState::Aborted || self.next() == Some(target)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// SyncRun
// ============================================================================

/// Tracks the phase of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRun {
    direction: SyncDirection,
    state: SyncState,
    started_at: DateTime<Utc>,
}

impl SyncRun {
    pub fn new(direction: SyncDirection) -> Self {
        Self {
            direction,
            state: SyncState::PreparingRoot,
            started_at: Utc::now(),
        }
    }

    pub fn direction(&self) -> SyncDirection {
        self.direction
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Attempts to move to `target`
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the transition is not allowed.
    pub fn transition_to(&mut self, target: SyncState) -> Result<(), DomainError> {
        if !self.state.can_transition_to(target) {
            return Err(DomainError::InvalidState {
                from: self.state.name().to_string(),
                to: target.name().to_string(),
            });
        }
        self.state = target;
        Ok(())
    }

    /// Move to the next phase on the success path
    pub fn advance(&mut self) -> Result<SyncState, DomainError> {
        let next = self.state.next().ok_or_else(|| DomainError::InvalidState {
            from: self.state.name().to_string(),
            to: "next".to_string(),
        })?;
        self.transition_to(next)?;
        Ok(next)
    }

    /// Mark the run as aborted; a no-op once terminal
    pub fn abort(&mut self) {
        if !self.state.is_terminal() {
            self.state = SyncState::Aborted;
        }
    }
}

// ============================================================================
// SyncSummary
// ============================================================================

/// Outcome of a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub dirs_created: u64,
    /// Files transferred that did not exist on the destination
    pub files_transferred: u64,
    pub files_updated: u64,
    /// Changed files left untouched by the conflict policy
    pub files_skipped: u64,
    pub files_deleted: u64,
    pub bytes_transferred: u64,
    pub dry_run: bool,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
}

impl SyncSummary {
    /// Total number of mutations performed (or simulated in a dry run)
    pub fn total_actions(&self) -> u64 {
        self.dirs_created + self.files_transferred + self.files_updated + self.files_deleted
    }

    pub fn is_noop(&self) -> bool {
        self.total_actions() == 0 && self.files_skipped == 0
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(d)?;
        Ok(Duration::from_secs_f64(secs.max(0.0)))
    }
}
