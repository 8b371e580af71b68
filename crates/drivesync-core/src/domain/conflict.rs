//! Conflict resolution policy and sync direction
//!
//! A single `ConflictResolution` applies uniformly to every changed file in a
//! run. The `SyncDirection` decides which side is authoritative.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Which side of the sync is the source of truth
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Local tree is mirrored to the remote
    Upload,
    /// Remote tree is mirrored to the local disk
    Download,
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncDirection::Upload => write!(f, "upload"),
            SyncDirection::Download => write!(f, "download"),
        }
    }
}

/// How changed files that are newer on the destination side are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// No policy given; any conflict aborts the run
    #[default]
    None,
    /// The local copy wins
    KeepLocal,
    /// The remote copy wins
    KeepRemote,
    /// The larger copy wins; equal sizes keep the destination
    KeepLargest,
}

impl ConflictResolution {
    /// Returns the snake_case name used in configuration files
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictResolution::None => "none",
            ConflictResolution::KeepLocal => "keep_local",
            ConflictResolution::KeepRemote => "keep_remote",
            ConflictResolution::KeepLargest => "keep_largest",
        }
    }

    /// Returns true if a policy was chosen
    pub fn is_set(&self) -> bool {
        !matches!(self, ConflictResolution::None)
    }
}

impl fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictResolution {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "none" => Ok(ConflictResolution::None),
            "keep_local" => Ok(ConflictResolution::KeepLocal),
            "keep_remote" => Ok(ConflictResolution::KeepRemote),
            "keep_largest" => Ok(ConflictResolution::KeepLargest),
            other => Err(DomainError::InvalidResolution(other.to_string())),
        }
    }
}
