//! Ignore rules for the local tree
//!
//! A plain-text file at the local root lists glob patterns, one per line.
//! Blank lines and lines starting with `#` are skipped. A path is ignored
//! when a pattern matches either its relative path or its file name. The
//! ignore file itself is always ignored.

use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use glob::Pattern;
use tracing::{debug, warn};

use drivesync_core::domain::RelPath;

/// Compiled ignore patterns for one sync root
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    file_name: String,
    patterns: Vec<Pattern>,
}

impl IgnoreRules {
    /// Rules that only exclude the ignore file itself
    pub fn empty(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            patterns: Vec::new(),
        }
    }

    /// Parse ignore file content
    ///
    /// Invalid patterns are logged and skipped.
    pub fn parse(file_name: impl Into<String>, content: &str) -> Self {
        let patterns = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| match Pattern::new(line) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!(pattern = %line, error = %e, "Skipping invalid ignore pattern");
                    None
                }
            })
            .collect();

        Self {
            file_name: file_name.into(),
            patterns,
        }
    }

    /// Load `<root>/<file_name>`; a missing file yields empty rules
    pub async fn load(root: &Path, file_name: &str) -> Result<Self> {
        let path = root.join(file_name);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let rules = Self::parse(file_name, &content);
                debug!(path = %path.display(), patterns = rules.len(), "Loaded ignore rules");
                Ok(rules)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::empty(file_name)),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    /// Number of active patterns
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn is_ignored(&self, rel_path: &RelPath) -> bool {
        if rel_path.as_str() == self.file_name {
            return true;
        }

        let name = rel_path.file_name().unwrap_or_default();
        self.patterns
            .iter()
            .any(|p| p.matches(rel_path.as_str()) || p.matches(name))
    }
}
