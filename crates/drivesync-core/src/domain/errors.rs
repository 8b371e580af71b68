//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! including validation failures, invalid state transitions, and path errors.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid absolute path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid path relative to the sync root
    #[error("Invalid relative path: {0}")]
    InvalidRelPath(String),

    /// Invalid content fingerprint (expected 32 hex characters)
    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Path is not within the configured sync root
    #[error("Path not within sync root: {0}")]
    PathNotInSyncRoot(String),

    /// Invalid remote ID format
    #[error("Invalid remote ID: {0}")]
    InvalidRemoteId(String),

    /// Unknown conflict resolution name
    #[error("Invalid conflict resolution: {0}")]
    InvalidResolution(String),
}
