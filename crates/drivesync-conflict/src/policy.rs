//! Resolution policy selection
//!
//! The policy for a run comes from the command-line flags when one is
//! given, and from the configured default strategy otherwise.

use tracing::debug;

use drivesync_core::domain::ConflictResolution;

use crate::error::ConflictError;

/// Turn the three mutually exclusive resolution flags into a policy
///
/// Returns `Ok(None)` when no flag was given.
pub fn resolution_from_flags(
    keep_local: bool,
    keep_remote: bool,
    keep_largest: bool,
) -> Result<Option<ConflictResolution>, ConflictError> {
    let chosen: Vec<ConflictResolution> = [
        (keep_local, ConflictResolution::KeepLocal),
        (keep_remote, ConflictResolution::KeepRemote),
        (keep_largest, ConflictResolution::KeepLargest),
    ]
    .into_iter()
    .filter_map(|(set, resolution)| set.then_some(resolution))
    .collect();

    match chosen.as_slice() {
        [] => Ok(None),
        [one] => Ok(Some(*one)),
        _ => Err(ConflictError::AmbiguousResolution),
    }
}

/// Policy for a run: explicit flags first, then the configured default
pub fn effective_resolution(
    flags: Option<ConflictResolution>,
    default_strategy: &str,
) -> Result<ConflictResolution, ConflictError> {
    if let Some(resolution) = flags {
        debug!(resolution = %resolution, "Using conflict resolution from flags");
        return Ok(resolution);
    }

    let resolution = default_strategy
        .parse()
        .map_err(|_| ConflictError::InvalidStrategy(default_strategy.to_string()))?;
    debug!(resolution = %resolution, "Using configured conflict resolution");
    Ok(resolution)
}
