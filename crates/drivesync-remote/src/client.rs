//! Google Drive v3 API client
//!
//! Provides a typed HTTP client for the Drive REST API. Handles the
//! authorization header, endpoint construction, JSON (de)serialization and
//! the mapping of failed responses onto [`RemoteError`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use drivesync_core::domain::RemoteId;
//! use drivesync_remote::client::DriveClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = DriveClient::new("access-token-here");
//! let root = client.get_file(&RemoteId::new("root-id")?).await?;
//! println!("{} ({})", root.name, root.kind());
//! # Ok(())
//! # }
//! ```

use anyhow::{Context, Result};
use drivesync_core::domain::files::PROP_SYNC_ROOT;
use drivesync_core::domain::{RemoteFile, RemoteId, FOLDER_MIME_TYPE};
use drivesync_core::ports::{ContentReader, NewItem, Page, Quota, RemoteError};
use futures_util::TryStreamExt;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio_util::io::StreamReader;
use tracing::debug;

use crate::files::{
    list_fields, About, CreateRequest, DriveFile, ErrorEnvelope, FileList, UpdateRequest,
    FILE_FIELDS,
};

/// Base URL for Drive v3 metadata calls
pub const DRIVE_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

/// Base URL for Drive v3 media uploads
pub const DRIVE_UPLOAD_BASE_URL: &str = "https://www.googleapis.com/upload/drive/v3";

/// Largest page the service hands out for `files.list`
const PAGE_SIZE: u32 = 1000;

// ============================================================================
// Response handling
// ============================================================================

/// Send a request, turning transport failures into [`RemoteError::Transport`]
pub(crate) async fn send(builder: RequestBuilder) -> Result<Response> {
    let response = builder
        .send()
        .await
        .map_err(|e| RemoteError::Transport(e.to_string()))?;
    check_status(response).await
}

/// Pass successful responses through; map everything else to a [`RemoteError`]
///
/// The message is taken from the Drive error envelope when the body has
/// one, otherwise the raw body is used.
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    Err(RemoteError::from_status(status.as_u16(), message).into())
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response
        .bytes()
        .await
        .map_err(|e| RemoteError::Transport(e.to_string()))?;
    serde_json::from_slice(&body).context("Failed to parse response body")
}

pub(crate) async fn read_file(response: Response) -> Result<RemoteFile> {
    let file: DriveFile = read_json(response).await?;
    Ok(RemoteFile::try_from(file)?)
}

// ============================================================================
// DriveClient
// ============================================================================

/// HTTP client for Google Drive API calls
///
/// Wraps `reqwest::Client` with the bearer token and the two base URLs the
/// service uses (metadata and upload).
#[derive(Debug, Clone)]
pub struct DriveClient {
    client: Client,
    base_url: String,
    upload_base_url: String,
    access_token: String,
}

impl DriveClient {
    /// Creates a client against the public Drive endpoints
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_urls(access_token, DRIVE_BASE_URL, DRIVE_UPLOAD_BASE_URL)
    }

    /// Creates a client with custom endpoints (configuration and tests)
    pub fn with_base_urls(
        access_token: impl Into<String>,
        base_url: impl Into<String>,
        upload_base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            upload_base_url: upload_base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn upload_base_url(&self) -> &str {
        &self.upload_base_url
    }

    /// Creates an authenticated request against the metadata API
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `path` - API path relative to the base URL (e.g. `/files`)
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.absolute(method, &format!("{}{}", self.base_url, path))
    }

    /// Creates an authenticated request against the upload API
    pub fn upload_request(&self, method: Method, path: &str) -> RequestBuilder {
        self.absolute(method, &format!("{}{}", self.upload_base_url, path))
    }

    /// Creates an authenticated request for a URL handed out by the service
    pub fn absolute(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.access_token)
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Fetches metadata for a single object
    #[tracing::instrument(skip(self), fields(id = %id))]
    pub async fn get_file(&self, id: &RemoteId) -> Result<RemoteFile> {
        let path = format!("/files/{id}");
        let response = send(
            self.request(Method::GET, &path)
                .query(&[("fields", FILE_FIELDS)]),
        )
        .await
        .with_context(|| format!("GET {path} failed"))?;
        read_file(response).await
    }

    /// Lists one page of the non-trashed children of a directory
    #[tracing::instrument(skip(self), fields(parent = %parent))]
    pub async fn list_children(&self, parent: &RemoteId, page_token: Option<&str>) -> Result<Page> {
        let q = format!("'{parent}' in parents and trashed = false");
        self.list(&q, page_token).await
    }

    /// Finds every folder carrying the sync-root app property
    #[tracing::instrument(skip(self))]
    pub async fn find_sync_roots(&self) -> Result<Vec<RemoteFile>> {
        let q = format!(
            "appProperties has {{ key='{PROP_SYNC_ROOT}' and value='true' }} \
             and mimeType = '{FOLDER_MIME_TYPE}' and trashed = false"
        );

        let mut roots = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self.list(&q, page_token.as_deref()).await?;
            roots.extend(page.files);
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = roots.len(), "Found sync roots");
        Ok(roots)
    }

    async fn list(&self, q: &str, page_token: Option<&str>) -> Result<Page> {
        let fields = list_fields();
        let page_size = PAGE_SIZE.to_string();
        let mut query = vec![
            ("q", q),
            ("fields", fields.as_str()),
            ("pageSize", page_size.as_str()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response = send(self.request(Method::GET, "/files").query(&query))
            .await
            .context("GET /files failed")?;
        let list: FileList = read_json(response).await?;
        Ok(list.into_page()?)
    }

    /// Creates a metadata-only object (a folder)
    #[tracing::instrument(skip(self, item), fields(name = %item.name, parent = %item.parent))]
    pub async fn create_folder(&self, item: NewItem) -> Result<RemoteFile> {
        let body = CreateRequest::from(item);
        let response = send(
            self.request(Method::POST, "/files")
                .query(&[("fields", FILE_FIELDS)])
                .json(&body),
        )
        .await
        .context("POST /files failed")?;
        read_file(response).await
    }

    /// Applies a metadata patch to an object
    #[tracing::instrument(skip(self, patch), fields(id = %id))]
    pub async fn update_metadata(&self, id: &RemoteId, patch: &UpdateRequest) -> Result<RemoteFile> {
        let path = format!("/files/{id}");
        let response = send(
            self.request(Method::PATCH, &path)
                .query(&[("fields", FILE_FIELDS)])
                .json(patch),
        )
        .await
        .with_context(|| format!("PATCH {path} failed"))?;
        read_file(response).await
    }

    /// Permanently deletes an object, bypassing the trash
    #[tracing::instrument(skip(self), fields(id = %id))]
    pub async fn delete(&self, id: &RemoteId) -> Result<()> {
        let path = format!("/files/{id}");
        send(self.request(Method::DELETE, &path))
            .await
            .with_context(|| format!("DELETE {path} failed"))?;
        Ok(())
    }

    /// Reads the account storage quota
    #[tracing::instrument(skip(self))]
    pub async fn quota(&self) -> Result<Quota> {
        let response = send(
            self.request(Method::GET, "/about")
                .query(&[("fields", "storageQuota")]),
        )
        .await
        .context("GET /about failed")?;
        let about: About = read_json(response).await?;
        let quota = Quota::try_from(about)?;
        debug!(limit = quota.limit, usage = quota.usage, "Storage quota");
        Ok(quota)
    }

    // ========================================================================
    // Content
    // ========================================================================

    /// Streams the content of a binary file
    ///
    /// The body is not buffered; the returned reader pulls chunks from the
    /// response as it is read.
    #[tracing::instrument(skip(self), fields(id = %id))]
    pub async fn download(&self, id: &RemoteId) -> Result<ContentReader> {
        let path = format!("/files/{id}");
        let response = send(
            self.request(Method::GET, &path)
                .query(&[("alt", "media")]),
        )
        .await
        .with_context(|| format!("GET {path}?alt=media failed"))?;

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        Ok(Box::new(StreamReader::new(Box::pin(stream))))
    }
}
