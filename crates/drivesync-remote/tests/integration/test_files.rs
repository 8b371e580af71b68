//! Metadata, listing, quota and download calls

use std::collections::HashMap;

use drivesync_core::domain::RemoteId;
use drivesync_core::ports::{classify, IRemoteStorage, NewItem, RemoteError, StatusCategory};
use drivesync_remote::DriveStorage;
use tokio::io::AsyncReadExt;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, API_PREFIX};

fn id(value: &str) -> RemoteId {
    RemoteId::new(value).unwrap()
}

// ============================================================================
// Metadata
// ============================================================================

#[tokio::test]
async fn test_get_file_sends_token_and_parses_resource() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path(format!("{API_PREFIX}/files/abc")))
        .and(header("Authorization", "Bearer test-access-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::file_json("abc", "a.txt", 5)))
        .expect(1)
        .mount(&server)
        .await;

    let file = client.get_file(&id("abc")).await.expect("get_file failed");

    assert_eq!(file.name, "a.txt");
    assert_eq!(file.size, 5);
    assert!(file.is_binary());
    assert!(!file.is_dir);
}

#[tokio::test]
async fn test_list_children_follows_page_tokens() {
    let (server, client) = common::setup_drive_mock().await;
    let q = "'root-0' in parents and trashed = false";

    Mock::given(method("GET"))
        .and(path(format!("{API_PREFIX}/files")))
        .and(query_param("q", q))
        .and(query_param("pageToken", "next-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [common::file_json("f2", "b.txt", 2)]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{API_PREFIX}/files")))
        .and(query_param("q", q))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "nextPageToken": "next-1",
            "files": [common::file_json("f1", "a.txt", 1), common::folder_json("d1", "dir")]
        })))
        .mount(&server)
        .await;

    let first = client.list_children(&id("root-0"), None).await.unwrap();
    assert_eq!(first.files.len(), 2);
    assert!(first.files[1].is_dir);
    assert_eq!(first.next_page_token.as_deref(), Some("next-1"));

    let second = client
        .list_children(&id("root-0"), Some("next-1"))
        .await
        .unwrap();
    assert_eq!(second.files[0].name, "b.txt");
    assert!(second.next_page_token.is_none());
}

#[tokio::test]
async fn test_find_sync_roots_collects_all_pages() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path(format!("{API_PREFIX}/files")))
        .and(query_param("pageToken", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "files": [common::folder_json("r2", "Photos")]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{API_PREFIX}/files")))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "nextPageToken": "p2",
            "files": [common::folder_json("r1", "Backup")]
        })))
        .mount(&server)
        .await;

    let roots = client.find_sync_roots().await.unwrap();
    let names: Vec<&str> = roots.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Backup", "Photos"]);
}

#[tokio::test]
async fn test_create_folder_posts_metadata() {
    let (server, client) = common::setup_drive_mock().await;
    let storage = DriveStorage::new(client);

    Mock::given(method("POST"))
        .and(path(format!("{API_PREFIX}/files")))
        .and(body_partial_json(serde_json::json!({
            "name": "dir",
            "parents": ["root-0"],
            "mimeType": "application/vnd.google-apps.folder",
            "appProperties": {"sync": "true", "syncRootId": "root-0"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::folder_json("d1", "dir")))
        .expect(1)
        .mount(&server)
        .await;

    let item = NewItem {
        name: "dir".to_string(),
        parent: id("root-0"),
        mime_type: Some("application/vnd.google-apps.folder".to_string()),
        modified: None,
        app_properties: HashMap::from([
            ("sync".to_string(), "true".to_string()),
            ("syncRootId".to_string(), "root-0".to_string()),
        ]),
    };
    let created = storage.create_folder(item).await.unwrap();

    assert_eq!(created.id.as_str(), "d1");
    assert!(created.is_dir);
}

#[tokio::test]
async fn test_set_properties_patches_app_properties() {
    let (server, client) = common::setup_drive_mock().await;
    let storage = DriveStorage::new(client);

    let mut marked = common::folder_json("root-0", "Backup");
    marked["appProperties"] = serde_json::json!({"sync": "true", "syncRoot": "true"});

    Mock::given(method("PATCH"))
        .and(path(format!("{API_PREFIX}/files/root-0")))
        .and(body_json(serde_json::json!({
            "appProperties": {"syncRoot": "true"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(marked))
        .expect(1)
        .mount(&server)
        .await;

    let props = HashMap::from([("syncRoot".to_string(), "true".to_string())]);
    let root = storage.set_properties(&id("root-0"), props).await.unwrap();

    assert!(root.is_sync_root());
}

#[tokio::test]
async fn test_delete_and_quota() {
    let (server, client) = common::setup_drive_mock().await;
    let storage = DriveStorage::new(client);

    Mock::given(method("DELETE"))
        .and(path(format!("{API_PREFIX}/files/gone")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{API_PREFIX}/about")))
        .and(query_param("fields", "storageQuota"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "storageQuota": {"limit": "16106127360", "usage": "1073741824"}
        })))
        .mount(&server)
        .await;

    storage.delete(&id("gone")).await.unwrap();

    let quota = storage.quota().await.unwrap();
    assert_eq!(quota.limit, 16_106_127_360);
    assert_eq!(quota.free(), Some(16_106_127_360 - 1_073_741_824));
}

// ============================================================================
// Errors
// ============================================================================

#[tokio::test]
async fn test_error_statuses_map_to_categories() {
    let (server, client) = common::setup_drive_mock().await;

    for (file_id, status, message) in [
        ("limited", 403, "User rate limit exceeded"),
        ("broken", 503, "Backend Error"),
        ("missing", 404, "File not found: missing."),
    ] {
        Mock::given(method("GET"))
            .and(path(format!("{API_PREFIX}/files/{file_id}")))
            .respond_with(
                ResponseTemplate::new(status).set_body_json(common::error_json(status, message)),
            )
            .mount(&server)
            .await;
    }

    let err = client.get_file(&id("limited")).await.unwrap_err();
    assert_eq!(classify(&err), StatusCategory::RateLimited);
    let remote = err.chain().find_map(|e| e.downcast_ref::<RemoteError>());
    assert_eq!(
        remote,
        Some(&RemoteError::RateLimited {
            status: 403,
            message: "User rate limit exceeded".to_string()
        })
    );

    let err = client.get_file(&id("broken")).await.unwrap_err();
    assert_eq!(classify(&err), StatusCategory::ServerError);

    let err = client.get_file(&id("missing")).await.unwrap_err();
    assert_eq!(classify(&err), StatusCategory::Other);
}

#[tokio::test]
async fn test_non_json_error_body_is_kept_as_message() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("GET"))
        .and(path(format!("{API_PREFIX}/files/x")))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = client.get_file(&id("x")).await.unwrap_err();
    let remote = err
        .chain()
        .find_map(|e| e.downcast_ref::<RemoteError>())
        .cloned();
    assert_eq!(
        remote,
        Some(RemoteError::Backend {
            status: 502,
            message: "bad gateway".to_string()
        })
    );
}

// ============================================================================
// Download
// ============================================================================

#[tokio::test]
async fn test_download_streams_content() {
    let (server, client) = common::setup_drive_mock().await;
    let content: Vec<u8> = (0..1_048_576).map(|i| (i % 251) as u8).collect();

    Mock::given(method("GET"))
        .and(path(format!("{API_PREFIX}/files/big")))
        .and(query_param("alt", "media"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(content.clone())
                .append_header("Content-Type", "application/octet-stream"),
        )
        .mount(&server)
        .await;

    let mut reader = client.download(&id("big")).await.unwrap();
    let mut data = Vec::new();
    reader.read_to_end(&mut data).await.unwrap();

    assert_eq!(data.len(), content.len());
    assert_eq!(data, content);
}
