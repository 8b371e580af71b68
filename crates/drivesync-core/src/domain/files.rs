//! File snapshots taken during a sync run
//!
//! `LocalFile` and `RemoteFile` are immutable snapshots of one side of the
//! tree. `SyncFiles` holds both sides for a single run and indexes them by
//! [`RelPath`], which is the only identity used for matching.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{Fingerprint, RelPath, RemoteId, SyncPath};

/// Mime type the storage service uses for directories
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// App property present on every item owned by a sync run
pub const PROP_SYNC: &str = "sync";
/// App property marking the top of a synchronized subtree
pub const PROP_SYNC_ROOT: &str = "syncRoot";
/// App property linking a created item back to its sync root
pub const PROP_SYNC_ROOT_ID: &str = "syncRootId";

/// Properties set on a directory the first time it is used as a sync root
pub fn sync_root_properties() -> HashMap<String, String> {
    HashMap::from([
        (PROP_SYNC.to_string(), "true".to_string()),
        (PROP_SYNC_ROOT.to_string(), "true".to_string()),
    ])
}

/// Properties set on every item the engine creates below a sync root
pub fn sync_item_properties(root_id: &RemoteId) -> HashMap<String, String> {
    HashMap::from([
        (PROP_SYNC.to_string(), "true".to_string()),
        (PROP_SYNC_ROOT_ID.to_string(), root_id.to_string()),
    ])
}

// ============================================================================
// LocalFile
// ============================================================================

/// A file or directory found below the local sync root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFile {
    /// Absolute path on disk
    pub path: SyncPath,
    /// Path relative to the sync root
    pub rel_path: RelPath,
    /// Size in bytes (0 for directories)
    pub size: u64,
    /// Last modification time
    pub modified: DateTime<Utc>,
    pub is_dir: bool,
}

impl LocalFile {
    /// Returns the file name, or an empty string for the root
    pub fn name(&self) -> &str {
        self.rel_path.file_name().unwrap_or_default()
    }
}

// ============================================================================
// RemoteFile
// ============================================================================

/// A file or directory found below the remote sync root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    pub id: RemoteId,
    /// Path relative to the sync root, computed from the parent chain
    pub rel_path: RelPath,
    pub name: String,
    /// Size in bytes (0 for directories and native documents)
    pub size: u64,
    /// MD5 fingerprint; absent for directories and native documents
    pub md5: Option<Fingerprint>,
    pub modified: DateTime<Utc>,
    pub created: Option<DateTime<Utc>>,
    pub mime_type: String,
    pub is_dir: bool,
    /// Parent ids as reported by the service
    #[serde(default)]
    pub parents: Vec<RemoteId>,
    #[serde(default)]
    pub app_properties: HashMap<String, String>,
}

impl RemoteFile {
    /// Returns true when the item carries binary content with a fingerprint
    pub fn is_binary(&self) -> bool {
        self.md5.is_some()
    }

    /// Returns true when the directory has been marked as a sync root
    pub fn is_sync_root(&self) -> bool {
        self.app_properties
            .get(PROP_SYNC_ROOT)
            .is_some_and(|v| v == "true")
    }

    /// Short type label used in listings: `dir`, `bin` or `doc`
    pub fn kind(&self) -> &'static str {
        if self.is_dir {
            "dir"
        } else if self.is_binary() {
            "bin"
        } else {
            "doc"
        }
    }

    /// Copy of this entry placed at another relative path
    pub fn with_rel_path(mut self, rel_path: RelPath) -> Self {
        self.rel_path = rel_path;
        self
    }
}

// ============================================================================
// ChangedFile
// ============================================================================

/// A local and a remote file sharing one `rel_path` whose contents differ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    pub local: LocalFile,
    pub remote: RemoteFile,
}

impl ChangedFile {
    pub fn new(local: LocalFile, remote: RemoteFile) -> Self {
        Self { local, remote }
    }

    pub fn rel_path(&self) -> &RelPath {
        &self.local.rel_path
    }

    /// Remote modification time is strictly later than the local one
    pub fn remote_newer(&self) -> bool {
        self.remote.modified > self.local.modified
    }

    /// Local modification time is strictly later than the remote one
    pub fn local_newer(&self) -> bool {
        self.local.modified > self.remote.modified
    }

    pub fn remote_larger(&self) -> bool {
        self.remote.size > self.local.size
    }

    pub fn local_larger(&self) -> bool {
        self.local.size > self.remote.size
    }
}

// ============================================================================
// SyncFiles
// ============================================================================

/// Both sides of one sync run, indexed by relative path
///
/// The remote index is mutable for the duration of the run: directories
/// created during the run are inserted so later items can resolve their
/// parent id. Local entries created by a download run are inserted the
/// same way.
#[derive(Debug, Clone)]
pub struct SyncFiles {
    root: RemoteFile,
    local: Vec<LocalFile>,
    remote: Vec<RemoteFile>,
    local_index: HashMap<RelPath, usize>,
    remote_index: HashMap<RelPath, usize>,
}

impl SyncFiles {
    /// Build the run index; the root is reachable under [`RelPath::root`]
    pub fn new(root: RemoteFile, local: Vec<LocalFile>, remote: Vec<RemoteFile>) -> Self {
        let root = root.with_rel_path(RelPath::root());
        let local_index = local
            .iter()
            .enumerate()
            .map(|(i, f)| (f.rel_path.clone(), i))
            .collect();
        let remote_index = remote
            .iter()
            .enumerate()
            .map(|(i, f)| (f.rel_path.clone(), i))
            .collect();

        Self {
            root,
            local,
            remote,
            local_index,
            remote_index,
        }
    }

    pub fn root(&self) -> &RemoteFile {
        &self.root
    }

    /// All local entries in enumeration order
    pub fn local(&self) -> &[LocalFile] {
        &self.local
    }

    /// All remote entries in enumeration order (the root is not included)
    pub fn remote(&self) -> &[RemoteFile] {
        &self.remote
    }

    pub fn find_local(&self, rel_path: &RelPath) -> Option<&LocalFile> {
        self.local_index.get(rel_path).map(|&i| &self.local[i])
    }

    /// Look up a remote entry; the empty path yields the sync root
    pub fn find_remote(&self, rel_path: &RelPath) -> Option<&RemoteFile> {
        if rel_path.is_root() {
            return Some(&self.root);
        }
        self.remote_index.get(rel_path).map(|&i| &self.remote[i])
    }

    /// Look up the remote directory an entry at `rel_path` belongs in
    pub fn find_remote_parent(&self, rel_path: &RelPath) -> Option<&RemoteFile> {
        let parent = rel_path.parent()?;
        self.find_remote(&parent).filter(|f| f.is_dir)
    }

    /// Insert or replace a remote entry
    pub fn insert_remote(&mut self, file: RemoteFile) {
        match self.remote_index.get(&file.rel_path) {
            Some(&i) => self.remote[i] = file,
            None => {
                self.remote_index.insert(file.rel_path.clone(), self.remote.len());
                self.remote.push(file);
            }
        }
    }

    /// Insert or replace a local entry
    pub fn insert_local(&mut self, file: LocalFile) {
        match self.local_index.get(&file.rel_path) {
            Some(&i) => self.local[i] = file,
            None => {
                self.local_index.insert(file.rel_path.clone(), self.local.len());
                self.local.push(file);
            }
        }
    }
}
