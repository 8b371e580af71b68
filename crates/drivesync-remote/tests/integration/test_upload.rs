//! Resumable upload sessions

use std::io::Cursor;

use chrono::{TimeZone, Utc};
use drivesync_core::domain::RemoteId;
use drivesync_core::ports::{classify, IRemoteStorage, NewItem, StatusCategory, Upload};
use drivesync_remote::{upload, DriveError, DriveStorage};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, SESSION_PATH, UPLOAD_PREFIX};

fn upload_of(data: Vec<u8>, chunk_size: u64) -> Upload {
    Upload {
        size: data.len() as u64,
        reader: Box::new(Cursor::new(data)),
        chunk_size,
        modified: Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()),
    }
}

fn new_item(name: &str) -> NewItem {
    NewItem {
        name: name.to_string(),
        parent: RemoteId::new("root-0").unwrap(),
        mime_type: None,
        modified: None,
        app_properties: Default::default(),
    }
}

#[tokio::test]
async fn test_upload_is_split_into_aligned_chunks() {
    let (server, client) = common::setup_drive_mock().await;
    let storage = DriveStorage::new(client);
    let size = 300 * 1024;

    Mock::given(method("POST"))
        .and(path(format!("{UPLOAD_PREFIX}/files")))
        .and(query_param("uploadType", "resumable"))
        .and(header("X-Upload-Content-Length", "307200"))
        .and(body_partial_json(serde_json::json!({"name": "big.bin", "parents": ["root-0"]})))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("Location", format!("{}{SESSION_PATH}", server.uri())),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(SESSION_PATH))
        .and(header("Content-Range", "bytes 0-262143/307200"))
        .respond_with(ResponseTemplate::new(308).append_header("Range", "bytes=0-262143"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(SESSION_PATH))
        .and(header("Content-Range", "bytes 262144-307199/307200"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(common::file_json("new-1", "big.bin", size)),
        )
        .expect(1)
        .mount(&server)
        .await;

    // A one-byte chunk size is rounded up to 256 KiB
    let file = storage
        .create_file(new_item("big.bin"), upload_of(vec![7u8; size as usize], 1))
        .await
        .expect("upload failed");

    assert_eq!(file.id.as_str(), "new-1");
    assert_eq!(file.size, size);
}

#[tokio::test]
async fn test_empty_file_sends_single_empty_range() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_session(&server, "POST", "/files").await;

    Mock::given(method("PUT"))
        .and(path(SESSION_PATH))
        .and(header("Content-Range", "bytes */0"))
        .respond_with(ResponseTemplate::new(201).set_body_json(common::file_json("e1", "empty", 0)))
        .expect(1)
        .mount(&server)
        .await;

    let file = upload::create_file(&client, new_item("empty"), upload_of(Vec::new(), 1024))
        .await
        .unwrap();

    assert_eq!(file.size, 0);
}

#[tokio::test]
async fn test_update_file_patches_existing_id() {
    let (server, client) = common::setup_drive_mock().await;
    let storage = DriveStorage::new(client);

    Mock::given(method("PATCH"))
        .and(path(format!("{UPLOAD_PREFIX}/files/abc")))
        .and(query_param("uploadType", "resumable"))
        .and(body_partial_json(
            serde_json::json!({"modifiedTime": "2024-05-01T10:00:00Z"}),
        ))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("Location", format!("{}{SESSION_PATH}", server.uri())),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(SESSION_PATH))
        .and(header("Content-Range", "bytes 0-4/5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::file_json("abc", "a.txt", 5)))
        .expect(1)
        .mount(&server)
        .await;

    let file = storage
        .update_file(&RemoteId::new("abc").unwrap(), upload_of(b"hello".to_vec(), 1024))
        .await
        .unwrap();

    assert_eq!(file.id.as_str(), "abc");
}

#[tokio::test]
async fn test_missing_location_header_fails() {
    let (server, client) = common::setup_drive_mock().await;

    Mock::given(method("POST"))
        .and(path(format!("{UPLOAD_PREFIX}/files")))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let err = upload::create_file(&client, new_item("a.txt"), upload_of(b"abc".to_vec(), 1024))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DriveError>(),
        Some(DriveError::MissingUploadLocation)
    ));
}

#[tokio::test]
async fn test_server_error_on_chunk_is_transient() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_session(&server, "POST", "/files").await;

    Mock::given(method("PUT"))
        .and(path(SESSION_PATH))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(common::error_json(503, "Backend Error")),
        )
        .mount(&server)
        .await;

    let err = upload::create_file(&client, new_item("a.txt"), upload_of(b"abc".to_vec(), 1024))
        .await
        .unwrap_err();

    assert_eq!(classify(&err), StatusCategory::ServerError);
}

#[tokio::test]
async fn test_reader_shorter_than_announced_size() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_session(&server, "POST", "/files").await;

    let mut short = upload_of(b"abcd".to_vec(), 1024);
    short.size = 10;

    let err = upload::create_file(&client, new_item("a.txt"), short)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DriveError>(),
        Some(DriveError::ShortRead { read: 4, size: 10 })
    ));
}

#[tokio::test]
async fn test_lost_bytes_are_detected() {
    let (server, client) = common::setup_drive_mock().await;
    common::mount_session(&server, "POST", "/files").await;

    Mock::given(method("PUT"))
        .and(path(SESSION_PATH))
        .respond_with(ResponseTemplate::new(308).append_header("Range", "bytes=0-99"))
        .mount(&server)
        .await;

    let data = vec![1u8; 300 * 1024];
    let err = upload::create_file(&client, new_item("a.bin"), upload_of(data, 1))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DriveError>(),
        Some(DriveError::IncompleteUpload {
            received: 100,
            expected: 262_144
        })
    ));
}
