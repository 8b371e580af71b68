//! Sync root listings and remote enumeration

use std::sync::Arc;

use drivesync_core::domain::RemoteId;
use drivesync_core::ports::{NullReporter, RemoteError};
use drivesync_sync::{LocalFileSystemAdapter, SyncEngine, SyncError};

use crate::common::{self, FakeRemote, ROOT_ID};

fn engine(remote: &Arc<FakeRemote>) -> SyncEngine {
    SyncEngine::new(
        remote.clone(),
        Arc::new(LocalFileSystemAdapter::new()),
        Arc::new(NullReporter),
    )
}

#[tokio::test]
async fn test_list_sync_roots_only_returns_marked_directories() {
    let remote = FakeRemote::with_sync_root();
    let other = remote.add_dir(ROOT_ID, "Photos");
    remote.add_dir(ROOT_ID, "Plain");
    remote.mark_sync_root(&other);

    let mut roots: Vec<String> = engine(&remote)
        .list_sync_roots()
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.name)
        .collect();
    roots.sort();

    assert_eq!(roots, vec!["Backup", "Photos"]);
}

#[tokio::test]
async fn test_list_sync_content_is_sorted_by_path() {
    let remote = FakeRemote::with_sync_root();
    remote.add_file(ROOT_ID, "zeta.txt", b"z", common::old_time());
    let docs = remote.add_dir(ROOT_ID, "docs");
    remote.add_file(&docs, "b.txt", b"b", common::old_time());
    remote.add_file(&docs, "a.txt", b"a", common::old_time());
    remote.add_doc(ROOT_ID, "alpha");

    let files = engine(&remote)
        .list_sync_content(&RemoteId::new(ROOT_ID).unwrap())
        .await
        .unwrap();

    let listing: Vec<(String, &str)> = files
        .iter()
        .map(|f| (f.rel_path.to_string(), f.kind()))
        .collect();
    assert_eq!(
        listing,
        vec![
            ("alpha".to_string(), "doc"),
            ("docs".to_string(), "dir"),
            ("docs/a.txt".to_string(), "bin"),
            ("docs/b.txt".to_string(), "bin"),
            ("zeta.txt".to_string(), "bin"),
        ]
    );
}

#[tokio::test]
async fn test_list_sync_content_rejects_plain_directory() {
    let remote = FakeRemote::new();

    let err = engine(&remote)
        .list_sync_content(&RemoteId::new(ROOT_ID).unwrap())
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::NotSyncRoot)
    ));
}

#[tokio::test]
async fn test_names_with_separators_are_skipped() {
    let remote = FakeRemote::with_sync_root();
    remote.add_file(ROOT_ID, "ok.txt", b"ok", common::old_time());
    remote.add_file(ROOT_ID, "a/b.txt", b"bad", common::old_time());

    let files = engine(&remote)
        .list_sync_content(&RemoteId::new(ROOT_ID).unwrap())
        .await
        .unwrap();

    let paths: Vec<String> = files.iter().map(|f| f.rel_path.to_string()).collect();
    assert_eq!(paths, vec!["ok.txt"]);
}

#[tokio::test(start_paused = true)]
async fn test_listing_retries_transient_failures() {
    let remote = FakeRemote::with_sync_root();
    remote.add_file(ROOT_ID, "a.txt", b"a", common::old_time());
    remote.fail("list_children", 2, RemoteError::from_status(500, "internal"));

    let files = engine(&remote)
        .list_sync_content(&RemoteId::new(ROOT_ID).unwrap())
        .await
        .unwrap();

    assert_eq!(files.len(), 1);
    assert_eq!(remote.calls("list_children"), 3);
}
