//! Content change detection
//!
//! A local and a remote file are considered changed when their sizes differ
//! or when the MD5 of the local content differs from the remote fingerprint.
//! A remote file without a fingerprint is always considered changed.
//!
//! [`DirectComparer`] answers a size mismatch without reading the file.
//! [`CachedComparer`] always resolves the local fingerprint first, so a
//! large file whose size changed still gets its new entry cached.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use drivesync_core::domain::{Fingerprint, LocalFile, RemoteFile};
use drivesync_core::ports::ILocalFileSystem;

use crate::cache::FileCache;

/// Decides whether a local file differs from its remote counterpart
#[async_trait]
pub trait FileComparer: Send + Sync {
    async fn changed(&self, local: &LocalFile, remote: &RemoteFile) -> Result<bool>;
}

/// Short-circuit checks that need no content read
///
/// Returns `Some(answer)` when no content read is needed.
fn quick_check(local: &LocalFile, remote: &RemoteFile) -> Option<bool> {
    if remote.md5.is_none() || local.size != remote.size {
        return Some(true);
    }
    None
}

fn differs(local: &LocalFile, remote: &RemoteFile, md5: &Fingerprint) -> bool {
    let changed = remote.md5.as_ref() != Some(md5);
    if changed {
        debug!(path = %local.rel_path, local = %md5, "Content differs");
    }
    changed
}

// ============================================================================
// DirectComparer
// ============================================================================

/// Hashes the local file on every comparison
pub struct DirectComparer {
    fs: Arc<dyn ILocalFileSystem>,
}

impl DirectComparer {
    pub fn new(fs: Arc<dyn ILocalFileSystem>) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl FileComparer for DirectComparer {
    async fn changed(&self, local: &LocalFile, remote: &RemoteFile) -> Result<bool> {
        if let Some(answer) = quick_check(local, remote) {
            return Ok(answer);
        }

        let md5 = self
            .fs
            .compute_fingerprint(&local.path)
            .await
            .with_context(|| format!("Failed to hash {}", local.path))?;
        Ok(differs(local, remote, &md5))
    }
}

// ============================================================================
// CachedComparer
// ============================================================================

/// Reuses fingerprints of large files across runs
///
/// New fingerprints of cacheable files are written back to the cache file
/// immediately. A failed write is logged and does not fail the comparison.
pub struct CachedComparer {
    fs: Arc<dyn ILocalFileSystem>,
    cache: Mutex<FileCache>,
}

impl CachedComparer {
    pub fn new(fs: Arc<dyn ILocalFileSystem>, cache: FileCache) -> Self {
        Self {
            fs,
            cache: Mutex::new(cache),
        }
    }

    /// Number of entries currently cached
    pub async fn cached_entries(&self) -> usize {
        self.cache.lock().await.len()
    }

    /// Cached fingerprint if still valid, otherwise a fresh hash
    async fn fingerprint(&self, local: &LocalFile) -> Result<Fingerprint> {
        if let Some(md5) = self.cache.lock().await.lookup(local).cloned() {
            debug!(path = %local.rel_path, "Fingerprint cache hit");
            return Ok(md5);
        }

        let md5 = self
            .fs
            .compute_fingerprint(&local.path)
            .await
            .with_context(|| format!("Failed to hash {}", local.path))?;

        let mut cache = self.cache.lock().await;
        if cache.insert(local, md5.clone()) {
            if let Err(e) = cache.persist().await {
                warn!(path = %cache.path().display(), error = %e, "Failed to save file cache");
            }
        }

        Ok(md5)
    }
}

#[async_trait]
impl FileComparer for CachedComparer {
    async fn changed(&self, local: &LocalFile, remote: &RemoteFile) -> Result<bool> {
        if remote.md5.is_none() {
            return Ok(true);
        }

        let md5 = self.fingerprint(local).await?;
        Ok(local.size != remote.size || differs(local, remote, &md5))
    }
}
