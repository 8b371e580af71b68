//! Tree enumeration for both sides of a sync run
//!
//! Both walks return entries with a `rel_path` relative to the sync root and
//! yield every directory before anything inside it. Relative paths are unique
//! on each side: a remote directory holding two entries with the same name
//! fails the walk.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use drivesync_core::domain::{LocalFile, RemoteFile, SyncPath};
use drivesync_core::ports::{ILocalFileSystem, IRemoteStorage};

use crate::ignore::IgnoreRules;
use crate::retry::with_retry;
use crate::SyncError;

/// List everything below the local root that is not ignored
///
/// Descendants of an ignored directory are dropped together with it.
pub async fn enumerate_local(
    fs: &dyn ILocalFileSystem,
    root: &SyncPath,
    ignore: &IgnoreRules,
) -> Result<Vec<LocalFile>> {
    let entries = fs
        .walk(root)
        .await
        .with_context(|| format!("Failed to list {root}"))?;

    let mut ignored_dirs: Vec<String> = Vec::new();
    let files: Vec<LocalFile> = entries
        .into_iter()
        .filter(|entry| {
            let rel = entry.rel_path.as_str();
            if ignored_dirs
                .iter()
                .any(|dir| rel.strip_prefix(dir.as_str()).is_some_and(|r| r.starts_with('/')))
            {
                return false;
            }
            if ignore.is_ignored(&entry.rel_path) {
                debug!(path = %entry.rel_path, "Ignored");
                if entry.is_dir {
                    ignored_dirs.push(rel.to_string());
                }
                return false;
            }
            true
        })
        .collect();

    debug!(root = %root, count = files.len(), "Local tree enumerated");
    Ok(files)
}

/// List everything below a remote directory
///
/// The root itself is not included. Items whose name cannot form a
/// relative path are logged and skipped along with their subtree. Two
/// entries with the same name in one directory fail with
/// [`SyncError::NameCollision`].
pub async fn enumerate_remote(remote: &dyn IRemoteStorage, root: &RemoteFile) -> Result<Vec<RemoteFile>> {
    let mut files = Vec::new();
    walk_remote(remote, root.clone(), &mut files).await?;
    debug!(root = %root.id, count = files.len(), "Remote tree enumerated");
    Ok(files)
}

fn walk_remote<'a>(
    remote: &'a dyn IRemoteStorage,
    dir: RemoteFile,
    out: &'a mut Vec<RemoteFile>,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let mut subdirs = Vec::new();
        let mut seen: HashMap<String, String> = HashMap::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = with_retry("list_children", || {
                let token = page_token.as_deref();
                let id = &dir.id;
                async move { remote.list_children(id, token).await }
            })
            .await
            .with_context(|| format!("Failed listing files in {}", dir.name))?;

            for child in page.files {
                let rel_path = match dir.rel_path.join(&child.name) {
                    Ok(rel) => rel,
                    Err(e) => {
                        warn!(name = %child.name, id = %child.id, error = %e, "Skipping remote item with unusable name");
                        continue;
                    }
                };
                if let Some(first) = seen.insert(child.name.clone(), child.id.to_string()) {
                    return Err(SyncError::NameCollision {
                        path: rel_path.to_string(),
                        first,
                        second: child.id.to_string(),
                    }
                    .into());
                }
                let child = child.with_rel_path(rel_path);
                if child.is_dir {
                    subdirs.push(child.clone());
                }
                out.push(child);
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        for subdir in subdirs {
            walk_remote(remote, subdir, out).await?;
        }
        Ok(())
    })
}
