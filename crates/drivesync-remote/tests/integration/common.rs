//! Shared test helpers for Drive API integration tests
//!
//! Provides wiremock-based mock server setup for the Drive v3 endpoints.
//! Each helper mounts the endpoints a test needs and returns a configured
//! DriveClient pointing at the mock server.

use drivesync_core::domain::FOLDER_MIME_TYPE;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use drivesync_remote::client::DriveClient;

pub const TOKEN: &str = "test-access-token";
pub const API_PREFIX: &str = "/drive/v3";
pub const UPLOAD_PREFIX: &str = "/upload/drive/v3";
pub const SESSION_PATH: &str = "/upload/session/s1";

/// Starts a mock server and returns a (MockServer, DriveClient) tuple
pub async fn setup_drive_mock() -> (MockServer, DriveClient) {
    let server = MockServer::start().await;
    let client = DriveClient::with_base_urls(
        TOKEN,
        format!("{}{API_PREFIX}", server.uri()),
        format!("{}{UPLOAD_PREFIX}", server.uri()),
    );
    (server, client)
}

/// A binary file resource
pub fn file_json(id: &str, name: &str, size: u64) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "mimeType": "text/plain",
        "size": size.to_string(),
        "md5Checksum": "5d41402abc4b2a76b9719d911017c592",
        "modifiedTime": "2024-05-01T10:00:00.000Z",
        "createdTime": "2024-04-01T10:00:00.000Z",
        "parents": ["root-0"]
    })
}

/// A folder resource
pub fn folder_json(id: &str, name: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "mimeType": FOLDER_MIME_TYPE,
        "modifiedTime": "2024-05-01T10:00:00.000Z",
        "createdTime": "2024-04-01T10:00:00.000Z",
        "parents": ["root-0"]
    })
}

/// Drive error envelope
pub fn error_json(code: u16, message: &str) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "code": code,
            "message": message,
            "errors": [{"message": message}]
        }
    })
}

/// Mounts a resumable session start that hands out [`SESSION_PATH`]
pub async fn mount_session(server: &MockServer, http_method: &str, file_path: &str) {
    Mock::given(method(http_method))
        .and(path(format!("{UPLOAD_PREFIX}{file_path}")))
        .and(query_param("uploadType", "resumable"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("Location", format!("{}{SESSION_PATH}", server.uri())),
        )
        .expect(1)
        .mount(server)
        .await;
}
