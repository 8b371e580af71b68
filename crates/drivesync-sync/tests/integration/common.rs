//! Shared test helpers for sync engine integration tests
//!
//! Provides an in-memory remote store with failure injection, a reporter
//! that records every event, and helpers to lay out local trees.

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::path::Path;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

use drivesync_core::domain::files::sync_root_properties;
use drivesync_core::domain::{
    ConflictResolution, Fingerprint, RelPath, RemoteFile, RemoteId, SyncSummary, FOLDER_MIME_TYPE,
};
use drivesync_core::ports::{
    ContentReader, IRemoteStorage, ISyncReporter, NewItem, Page, Quota, RemoteError, SyncEvent,
    Upload,
};
use drivesync_sync::{
    DirectComparer, DownloadSyncArgs, LocalFileSystemAdapter, SyncEngine, UploadSyncArgs,
};

pub const ROOT_ID: &str = "root-0";
pub const ROOT_NAME: &str = "Backup";
pub const IGNORE_FILE: &str = ".drivesyncignore";

/// Children listing page size, small enough to exercise paging
const PAGE_SIZE: usize = 2;

// ============================================================================
// FakeRemote
// ============================================================================

struct Entry {
    file: RemoteFile,
    content: Vec<u8>,
}

struct Failure {
    remaining: usize,
    error: RemoteError,
}

#[derive(Default)]
struct State {
    entries: BTreeMap<String, Entry>,
    next_id: u64,
    quota: Quota,
    mutations: Vec<String>,
    calls: HashMap<String, usize>,
    failures: HashMap<String, Failure>,
    stall_uploads: bool,
    stall_downloads: bool,
}

/// In-memory remote store
///
/// Ids are assigned sequentially. Every mutating call is recorded so tests
/// can assert on the exact side effects of a run.
pub struct FakeRemote {
    state: Mutex<State>,
}

impl FakeRemote {
    /// A store holding one empty, unmarked directory named [`ROOT_NAME`]
    pub fn new() -> Arc<Self> {
        let mut state = State::default();
        state.entries.insert(
            ROOT_ID.to_string(),
            Entry {
                file: dir_file(ROOT_ID, ROOT_NAME, None),
                content: Vec::new(),
            },
        );
        Arc::new(Self {
            state: Mutex::new(state),
        })
    }

    /// A store whose root already carries the sync-root marker
    pub fn with_sync_root() -> Arc<Self> {
        let remote = Self::new();
        remote.mark_sync_root(ROOT_ID);
        remote
    }

    pub fn mark_sync_root(&self, id: &str) {
        let mut state = self.state.lock().unwrap();
        let entry = state.entries.get_mut(id).unwrap();
        entry.file.app_properties.extend(sync_root_properties());
    }

    pub fn add_dir(&self, parent: &str, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id();
        state.entries.insert(
            id.clone(),
            Entry {
                file: dir_file(&id, name, Some(parent)),
                content: Vec::new(),
            },
        );
        id
    }

    pub fn add_file(&self, parent: &str, name: &str, content: &[u8], modified: DateTime<Utc>) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id();
        state.entries.insert(
            id.clone(),
            Entry {
                file: binary_file(&id, name, parent, content, modified),
                content: content.to_vec(),
            },
        );
        id
    }

    /// Add a native document, which has no size and no fingerprint
    pub fn add_doc(&self, parent: &str, name: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id();
        let mut file = binary_file(&id, name, parent, b"", old_time());
        file.md5 = None;
        file.mime_type = "application/vnd.google-apps.document".to_string();
        state.entries.insert(
            id.clone(),
            Entry {
                file,
                content: Vec::new(),
            },
        );
        id
    }

    pub fn set_quota(&self, limit: u64, usage: u64) {
        self.state.lock().unwrap().quota = Quota { limit, usage };
    }

    /// Make the next `times` calls of `operation` fail with `error`
    pub fn fail(&self, operation: &str, times: usize, error: RemoteError) {
        self.state.lock().unwrap().failures.insert(
            operation.to_string(),
            Failure {
                remaining: times,
                error,
            },
        );
    }

    /// Make uploads hang without ever reading their content
    pub fn stall_uploads(&self) {
        self.state.lock().unwrap().stall_uploads = true;
    }

    /// Make downloads hang after delivering the file content
    pub fn stall_downloads(&self, stalled: bool) {
        self.state.lock().unwrap().stall_downloads = stalled;
    }

    /// Number of times `operation` was called, failed calls included
    pub fn calls(&self, operation: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    /// Successful mutations in call order, e.g. `create_file a.txt`
    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().unwrap().mutations.clone()
    }

    pub fn root(&self) -> RemoteFile {
        self.state.lock().unwrap().entries[ROOT_ID].file.clone()
    }

    /// Relative paths of everything below the root, sorted
    pub fn paths(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut paths: Vec<String> = state
            .entries
            .keys()
            .filter(|id| id.as_str() != ROOT_ID)
            .filter_map(|id| state.path_of(id))
            .collect();
        paths.sort();
        paths
    }

    /// Entry at a relative path below the root
    pub fn find(&self, rel: &str) -> Option<RemoteFile> {
        let state = self.state.lock().unwrap();
        state
            .entries
            .iter()
            .find(|(id, _)| state.path_of(id).as_deref() == Some(rel))
            .map(|(_, e)| e.file.clone())
    }

    pub fn content(&self, rel: &str) -> Option<Vec<u8>> {
        let id = self.find(rel)?.id;
        let state = self.state.lock().unwrap();
        state.entries.get(id.as_str()).map(|e| e.content.clone())
    }

    fn begin(&self, operation: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(operation.to_string()).or_default() += 1;
        if let Some(failure) = state.failures.get_mut(operation) {
            if failure.remaining > 0 {
                failure.remaining -= 1;
                return Err(failure.error.clone().into());
            }
        }
        Ok(())
    }
}

impl State {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("id-{}", self.next_id)
    }

    /// Path relative to the root, `None` if the entry is not below it
    fn path_of(&self, id: &str) -> Option<String> {
        let mut segments = Vec::new();
        let mut current = self.entries.get(id)?;
        loop {
            if current.file.id.as_str() == ROOT_ID {
                break;
            }
            segments.push(current.file.name.clone());
            let parent = current.file.parents.first()?;
            current = self.entries.get(parent.as_str())?;
        }
        segments.reverse();
        Some(segments.join("/"))
    }

    fn remove_tree(&mut self, id: &str) {
        let children: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.file.parents.iter().any(|p| p.as_str() == id))
            .map(|(child, _)| child.clone())
            .collect();
        for child in children {
            self.remove_tree(&child);
        }
        self.entries.remove(id);
    }
}

#[async_trait]
impl IRemoteStorage for FakeRemote {
    async fn get_file(&self, id: &RemoteId) -> Result<RemoteFile> {
        self.begin("get_file")?;
        let state = self.state.lock().unwrap();
        state
            .entries
            .get(id.as_str())
            .map(|e| e.file.clone())
            .ok_or_else(|| RemoteError::from_status(404, format!("File not found: {id}")).into())
    }

    async fn list_children(&self, parent: &RemoteId, page_token: Option<&str>) -> Result<Page> {
        self.begin("list_children")?;
        let state = self.state.lock().unwrap();
        let mut children: Vec<RemoteFile> = state
            .entries
            .values()
            .filter(|e| e.file.parents.contains(parent))
            .map(|e| e.file.clone())
            .collect();
        children.sort_by(|a, b| a.name.cmp(&b.name));

        let offset: usize = page_token.map(|t| t.parse()).transpose()?.unwrap_or(0);
        let end = (offset + PAGE_SIZE).min(children.len());
        let next_page_token = (end < children.len()).then(|| end.to_string());
        Ok(Page {
            files: children[offset..end].to_vec(),
            next_page_token,
        })
    }

    async fn find_sync_roots(&self) -> Result<Vec<RemoteFile>> {
        self.begin("find_sync_roots")?;
        let state = self.state.lock().unwrap();
        Ok(state
            .entries
            .values()
            .filter(|e| e.file.is_dir && e.file.is_sync_root())
            .map(|e| e.file.clone())
            .collect())
    }

    async fn create_folder(&self, item: NewItem) -> Result<RemoteFile> {
        self.begin("create_folder")?;
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id();
        let mut file = dir_file(&id, &item.name, Some(item.parent.as_str()));
        file.app_properties = item.app_properties;
        state.entries.insert(
            id,
            Entry {
                file: file.clone(),
                content: Vec::new(),
            },
        );
        state.mutations.push(format!("create_folder {}", item.name));
        Ok(file)
    }

    async fn create_file(&self, item: NewItem, mut upload: Upload) -> Result<RemoteFile> {
        self.begin("create_file")?;
        let stalled = self.state.lock().unwrap().stall_uploads;
        if stalled {
            std::future::pending::<()>().await;
        }

        let mut content = Vec::new();
        upload.reader.read_to_end(&mut content).await?;
        if content.len() as u64 != upload.size {
            bail!("short upload: {} of {} bytes", content.len(), upload.size);
        }

        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id();
        let modified = item.modified.unwrap_or_else(Utc::now);
        let mut file = binary_file(&id, &item.name, item.parent.as_str(), &content, modified);
        file.app_properties = item.app_properties;
        state.entries.insert(
            id,
            Entry {
                file: file.clone(),
                content,
            },
        );
        state.mutations.push(format!("create_file {}", item.name));
        Ok(file)
    }

    async fn update_file(&self, id: &RemoteId, mut upload: Upload) -> Result<RemoteFile> {
        self.begin("update_file")?;
        let mut content = Vec::new();
        upload.reader.read_to_end(&mut content).await?;

        let mut state = self.state.lock().unwrap();
        let entry = state
            .entries
            .get_mut(id.as_str())
            .ok_or_else(|| anyhow!(RemoteError::from_status(404, "not found")))?;
        let parent = entry.file.parents[0].to_string();
        let modified = upload.modified.unwrap_or_else(Utc::now);
        let mut file = binary_file(id.as_str(), &entry.file.name, &parent, &content, modified);
        file.app_properties = entry.file.app_properties.clone();
        entry.file = file.clone();
        entry.content = content;
        let name = file.name.clone();
        state.mutations.push(format!("update_file {name}"));
        Ok(file)
    }

    async fn set_properties(
        &self,
        id: &RemoteId,
        properties: HashMap<String, String>,
    ) -> Result<RemoteFile> {
        self.begin("set_properties")?;
        let mut state = self.state.lock().unwrap();
        let entry = state
            .entries
            .get_mut(id.as_str())
            .ok_or_else(|| anyhow!(RemoteError::from_status(404, "not found")))?;
        entry.file.app_properties.extend(properties);
        let file = entry.file.clone();
        state.mutations.push(format!("set_properties {}", file.name));
        Ok(file)
    }

    async fn delete(&self, id: &RemoteId) -> Result<()> {
        self.begin("delete")?;
        let mut state = self.state.lock().unwrap();
        let path = state.path_of(id.as_str()).unwrap_or_default();
        state.remove_tree(id.as_str());
        state.mutations.push(format!("delete {path}"));
        Ok(())
    }

    async fn download(&self, id: &RemoteId) -> Result<ContentReader> {
        self.begin("download")?;
        let state = self.state.lock().unwrap();
        let entry = state
            .entries
            .get(id.as_str())
            .ok_or_else(|| anyhow!(RemoteError::from_status(404, "not found")))?;
        let content = Cursor::new(entry.content.clone());
        if state.stall_downloads {
            return Ok(Box::new(content.chain(Stalled)));
        }
        Ok(Box::new(content))
    }

    async fn quota(&self) -> Result<Quota> {
        self.begin("quota")?;
        Ok(self.state.lock().unwrap().quota)
    }
}

/// Reader that never yields data and never wakes its task
struct Stalled;

impl AsyncRead for Stalled {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Poll::Pending
    }
}

fn dir_file(id: &str, name: &str, parent: Option<&str>) -> RemoteFile {
    RemoteFile {
        id: RemoteId::new(id).unwrap(),
        rel_path: RelPath::root(),
        name: name.to_string(),
        size: 0,
        md5: None,
        modified: old_time(),
        created: Some(old_time()),
        mime_type: FOLDER_MIME_TYPE.to_string(),
        is_dir: true,
        parents: parent.map(|p| RemoteId::new(p).unwrap()).into_iter().collect(),
        app_properties: HashMap::new(),
    }
}

fn binary_file(
    id: &str,
    name: &str,
    parent: &str,
    content: &[u8],
    modified: DateTime<Utc>,
) -> RemoteFile {
    RemoteFile {
        id: RemoteId::new(id).unwrap(),
        rel_path: RelPath::root(),
        name: name.to_string(),
        size: content.len() as u64,
        md5: Some(Fingerprint::from_digest(md5::compute(content).0)),
        modified,
        created: Some(modified),
        mime_type: "application/octet-stream".to_string(),
        is_dir: false,
        parents: vec![RemoteId::new(parent).unwrap()],
        app_properties: HashMap::new(),
    }
}

// ============================================================================
// Reporter
// ============================================================================

/// Reporter that keeps every event
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Rendered lines, without the trailing `Sync finished` line
    pub fn lines(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| !matches!(e, SyncEvent::Finished { .. }))
            .map(ToString::to_string)
            .collect()
    }

    /// Rendered numbered action lines only
    pub fn actions(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, SyncEvent::Action { .. }))
            .map(ToString::to_string)
            .collect()
    }

    pub fn finished(&self) -> bool {
        self.events
            .lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, SyncEvent::Finished { .. }))
    }
}

impl ISyncReporter for RecordingReporter {
    fn report(&self, event: &SyncEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ============================================================================
// Local trees and engine setup
// ============================================================================

/// A timestamp well before any file a test creates on disk
pub fn old_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()
}

/// A timestamp well after any file a test creates on disk
pub fn future_time() -> DateTime<Utc> {
    Utc::now() + chrono::Duration::days(1)
}

pub fn write_local(root: &Path, rel: &str, content: &[u8]) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

pub fn read_local(root: &Path, rel: &str) -> Vec<u8> {
    std::fs::read(root.join(rel)).unwrap()
}

pub fn engine(remote: &Arc<FakeRemote>, reporter: &Arc<RecordingReporter>) -> SyncEngine {
    SyncEngine::new(
        remote.clone(),
        Arc::new(LocalFileSystemAdapter::new()),
        reporter.clone(),
    )
}

pub fn upload_args(local: &Path) -> UploadSyncArgs {
    UploadSyncArgs {
        local_path: local.to_path_buf(),
        root_id: RemoteId::new(ROOT_ID).unwrap(),
        dry_run: false,
        delete_extraneous: false,
        resolution: ConflictResolution::None,
        timeout: Duration::from_secs(300),
        chunk_size: 8 * 1024 * 1024,
        comparer: Arc::new(DirectComparer::new(Arc::new(LocalFileSystemAdapter::new()))),
        ignore_file: IGNORE_FILE.to_string(),
    }
}

pub fn download_args(local: &Path) -> DownloadSyncArgs {
    DownloadSyncArgs {
        root_id: RemoteId::new(ROOT_ID).unwrap(),
        local_path: local.to_path_buf(),
        dry_run: false,
        delete_extraneous: false,
        resolution: ConflictResolution::None,
        timeout: Duration::from_secs(300),
        comparer: Arc::new(DirectComparer::new(Arc::new(LocalFileSystemAdapter::new()))),
        ignore_file: IGNORE_FILE.to_string(),
    }
}

/// Run an upload with a fresh reporter
pub async fn upload(
    remote: &Arc<FakeRemote>,
    args: UploadSyncArgs,
) -> (Result<SyncSummary>, Arc<RecordingReporter>) {
    let reporter = RecordingReporter::new();
    let result = engine(remote, &reporter).upload_sync(args).await;
    (result, reporter)
}

/// Run a download with a fresh reporter
pub async fn download(
    remote: &Arc<FakeRemote>,
    args: DownloadSyncArgs,
) -> (Result<SyncSummary>, Arc<RecordingReporter>) {
    let reporter = RecordingReporter::new();
    let result = engine(remote, &reporter).download_sync(args).await;
    (result, reporter)
}
