//! drivesync Conflict - Conflict detection and resolution
//!
//! Provides:
//! - The per-file resolver deciding skip-or-proceed for a changed file
//! - Up-front detection of conflicts with a tabular report
//! - Resolution policy from command-line flags and configuration

pub mod detector;
pub mod error;
pub mod policy;
pub mod resolver;

pub use detector::{ensure_no_conflicts, find_conflicts, format_conflicts};
pub use error::ConflictError;
pub use policy::{effective_resolution, resolution_from_flags};
pub use resolver::{check_conflict, ConflictDecision};
