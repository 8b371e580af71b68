//! Up-front conflict detection
//!
//! Before any transfer starts, a run without a resolution policy scans
//! every changed file. If any destination copy is newer than its source,
//! the run aborts and every conflicting path is reported together.

use tracing::{info, warn};

use drivesync_core::domain::{
    format_datetime, format_size, ChangedFile, ConflictResolution, SyncDirection,
};

use crate::error::ConflictError;
use crate::resolver::is_conflict;

/// Changed files whose destination copy is newer than the source
pub fn find_conflicts(changed: &[ChangedFile], direction: SyncDirection) -> Vec<&ChangedFile> {
    changed
        .iter()
        .filter(|c| is_conflict(c, direction))
        .collect()
}

/// Render conflicting files as an aligned table
pub fn format_conflicts(conflicts: &[&ChangedFile]) -> String {
    const HEADER: [&str; 5] = [
        "Path",
        "Size Local",
        "Size Remote",
        "Modified Local",
        "Modified Remote",
    ];

    let rows: Vec<[String; 5]> = conflicts
        .iter()
        .map(|c| {
            [
                c.rel_path().to_string(),
                format_size(c.local.size, false),
                format_size(c.remote.size, false),
                format_datetime(&c.local.modified),
                format_datetime(&c.remote.modified),
            ]
        })
        .collect();

    let mut widths = HEADER.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let mut push_line = |cells: &[&str]| {
        let line: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        out.push_str(line.join("   ").trim_end());
        out.push('\n');
    };

    push_line(&HEADER);
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        push_line(&cells);
    }

    out
}

/// Abort with [`ConflictError::Unresolved`] when conflicts exist and no policy was given
pub fn ensure_no_conflicts(
    changed: &[ChangedFile],
    resolution: ConflictResolution,
    direction: SyncDirection,
) -> Result<(), ConflictError> {
    if resolution.is_set() {
        return Ok(());
    }

    let conflicts = find_conflicts(changed, direction);
    if conflicts.is_empty() {
        info!(changed = changed.len(), "No conflicting files found");
        return Ok(());
    }

    warn!(
        conflicts = conflicts.len(),
        direction = %direction,
        "Conflicting files found and no resolution given"
    );

    Err(ConflictError::Unresolved {
        direction,
        count: conflicts.len(),
        report: format_conflicts(&conflicts),
    })
}
