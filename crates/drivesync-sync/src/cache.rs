//! Persistent fingerprint cache
//!
//! Maps absolute local paths to the MD5 computed for them, keyed by the
//! size and modification time seen at that moment. An entry is only valid
//! while both still match. Only files above [`MIN_CACHE_FILE_SIZE`] are
//! cached; hashing smaller files is cheaper than keeping the entry.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use drivesync_core::domain::{Fingerprint, LocalFile};

/// Files must be strictly larger than this to be cached (5 MiB)
pub const MIN_CACHE_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// One cache entry as stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedFileInfo {
    pub size: u64,
    /// Modification time in Unix nanoseconds
    pub modified: i64,
    pub md5: Fingerprint,
}

/// In-memory view of the cache file
#[derive(Debug, Clone)]
pub struct FileCache {
    path: PathBuf,
    entries: HashMap<String, CachedFileInfo>,
}

impl FileCache {
    /// Empty cache that persists to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: HashMap::new(),
        }
    }

    /// Read the cache file; a missing or unreadable file yields an empty cache
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(data) => match serde_json::from_slice(&data) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ignoring corrupt file cache");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read file cache");
                HashMap::new()
            }
        };

        debug!(path = %path.display(), entries = entries.len(), "File cache loaded");
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached fingerprint, if size and modification time still match
    pub fn lookup(&self, local: &LocalFile) -> Option<&Fingerprint> {
        let modified = local.modified.timestamp_nanos_opt()?;
        self.entries
            .get(&cache_key(local))
            .filter(|c| c.size == local.size && c.modified == modified)
            .map(|c| &c.md5)
    }

    /// Returns true if `local` qualifies for caching
    pub fn should_cache(local: &LocalFile) -> bool {
        local.size > MIN_CACHE_FILE_SIZE
    }

    /// Record a freshly computed fingerprint; returns false if the file does not qualify
    pub fn insert(&mut self, local: &LocalFile, md5: Fingerprint) -> bool {
        let Some(modified) = local.modified.timestamp_nanos_opt() else {
            return false;
        };
        if !Self::should_cache(local) {
            return false;
        }

        self.entries.insert(
            cache_key(local),
            CachedFileInfo {
                size: local.size,
                modified,
                md5,
            },
        );
        true
    }

    /// Write the whole cache to disk atomically
    pub async fn persist(&self) -> Result<()> {
        let data = serde_json::to_vec(&self.entries).context("Failed to serialize file cache")?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = {
            let mut p = self.path.as_os_str().to_owned();
            p.push(".tmp");
            PathBuf::from(p)
        };
        tokio::fs::write(&tmp, &data)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!(path = %self.path.display(), entries = self.entries.len(), "File cache persisted");
        Ok(())
    }
}

fn cache_key(local: &LocalFile) -> String {
    local.path.as_path().to_string_lossy().into_owned()
}
