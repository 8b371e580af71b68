//! Resumable uploads for the Drive v3 API
//!
//! Every upload, including empty files, goes through a resumable session:
//! - [`start_session`] announces the metadata and total size, and receives
//!   the session URL in the `Location` header
//! - [`upload_content`] sends the content in `PUT` requests carrying a
//!   `Content-Range` header; `308 Resume Incomplete` acknowledges an
//!   intermediate chunk and `200`/`201` carries the final file resource
//!
//! ## References
//!
//! - [Resumable uploads](https://developers.google.com/drive/api/guides/manage-uploads#resumable)

use anyhow::{Context, Result};
use drivesync_core::domain::{RemoteFile, RemoteId};
use drivesync_core::ports::{NewItem, RemoteError, Upload};
use reqwest::header::{HeaderMap, CONTENT_RANGE, LOCATION, RANGE};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing::{debug, info};
use url::Url;

use crate::client::{check_status, read_file, send, DriveClient};
use crate::files::{CreateRequest, UpdateRequest, FILE_FIELDS};
use crate::DriveError;

/// Chunk sizes must be multiples of 256 KiB, except for the final chunk
pub const CHUNK_ALIGNMENT: u64 = 256 * 1024;

/// Round a requested chunk size up to the next multiple of [`CHUNK_ALIGNMENT`]
pub fn align_chunk_size(chunk_size: u64) -> u64 {
    chunk_size
        .div_ceil(CHUNK_ALIGNMENT)
        .max(1)
        .saturating_mul(CHUNK_ALIGNMENT)
}

/// Outcome of a single chunk request
#[derive(Debug)]
pub enum ChunkOutcome {
    /// The upload is complete
    Done(Box<RemoteFile>),
    /// More data is expected; carries the committed byte count when reported
    Incomplete(Option<u64>),
}

/// Parse the committed byte count out of a `Range: bytes=0-N` header
fn committed_bytes(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(RANGE)?.to_str().ok()?;
    let end = value.strip_prefix("bytes=")?.split('-').nth(1)?;
    end.trim().parse::<u64>().ok().map(|e| e + 1)
}

// ============================================================================
// Session
// ============================================================================

/// Opens a resumable upload session and returns its URL
pub async fn start_session<B: Serialize + ?Sized>(
    client: &DriveClient,
    method: Method,
    path: &str,
    metadata: &B,
    size: u64,
) -> Result<Url> {
    let response = send(
        client
            .upload_request(method, path)
            .query(&[("uploadType", "resumable"), ("fields", FILE_FIELDS)])
            .header("X-Upload-Content-Length", size.to_string())
            .json(metadata),
    )
    .await
    .with_context(|| format!("Failed to start upload session for {path}"))?;

    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(DriveError::MissingUploadLocation)?;

    let url = Url::parse(location).map_err(|e| {
        DriveError::InvalidResponse(format!("invalid upload session URL {location}: {e}"))
    })?;
    debug!(session = %url, size, "Upload session started");
    Ok(url)
}

/// Sends one chunk to an upload session
///
/// # Arguments
/// * `range` - Value of the `Content-Range` header, e.g. `bytes 0-262143/1000000`
pub async fn upload_chunk(
    client: &DriveClient,
    session: &Url,
    data: Vec<u8>,
    range: &str,
) -> Result<ChunkOutcome> {
    let response = client
        .absolute(Method::PUT, session.as_str())
        .header(CONTENT_RANGE, range)
        .body(data)
        .send()
        .await
        .map_err(|e| RemoteError::Transport(e.to_string()))?;

    if response.status() == StatusCode::PERMANENT_REDIRECT {
        return Ok(ChunkOutcome::Incomplete(committed_bytes(response.headers())));
    }

    let response = check_status(response).await?;
    Ok(ChunkOutcome::Done(Box::new(read_file(response).await?)))
}

/// Streams the whole content of `upload` into a session
pub async fn upload_content(client: &DriveClient, session: &Url, upload: Upload) -> Result<RemoteFile> {
    let Upload {
        mut reader,
        size,
        chunk_size,
        ..
    } = upload;

    if size == 0 {
        return match upload_chunk(client, session, Vec::new(), "bytes */0").await? {
            ChunkOutcome::Done(file) => Ok(*file),
            ChunkOutcome::Incomplete(_) => Err(DriveError::InvalidResponse(
                "service expects content for an empty upload".to_string(),
            )
            .into()),
        };
    }

    let chunk_size = align_chunk_size(chunk_size);
    let mut offset = 0u64;

    loop {
        let limit = (size - offset).min(chunk_size);
        let mut data = Vec::with_capacity(limit as usize);
        (&mut reader)
            .take(limit)
            .read_to_end(&mut data)
            .await
            .context("Failed to read upload content")?;

        let len = data.len() as u64;
        if len < limit {
            return Err(DriveError::ShortRead {
                read: offset + len,
                size,
            }
            .into());
        }

        let end = offset + len - 1;
        let range = format!("bytes {offset}-{end}/{size}");
        debug!(range = %range, "Uploading chunk");

        match upload_chunk(client, session, data, &range)
            .await
            .with_context(|| format!("Failed to upload chunk {range}"))?
        {
            ChunkOutcome::Done(file) => {
                info!(name = %file.name, size, "Upload complete");
                return Ok(*file);
            }
            ChunkOutcome::Incomplete(committed) => {
                offset += len;
                if let Some(committed) = committed {
                    if committed != offset {
                        return Err(DriveError::IncompleteUpload {
                            received: committed,
                            expected: offset,
                        }
                        .into());
                    }
                }
                if offset >= size {
                    return Err(DriveError::InvalidResponse(
                        "service expects more data after the final chunk".to_string(),
                    )
                    .into());
                }
            }
        }
    }
}

// ============================================================================
// Create / update
// ============================================================================

/// Creates a file from streamed content
#[tracing::instrument(skip(client, item, upload), fields(name = %item.name, size = upload.size))]
pub async fn create_file(client: &DriveClient, item: NewItem, upload: Upload) -> Result<RemoteFile> {
    let metadata = CreateRequest::from(item);
    let session = start_session(client, Method::POST, "/files", &metadata, upload.size).await?;
    upload_content(client, &session, upload).await
}

/// Replaces the content of an existing file, keeping its id
#[tracing::instrument(skip(client, upload), fields(id = %id, size = upload.size))]
pub async fn update_file(client: &DriveClient, id: &RemoteId, upload: Upload) -> Result<RemoteFile> {
    let metadata = UpdateRequest {
        modified_time: upload.modified,
        app_properties: None,
    };
    let path = format!("/files/{id}");
    let session = start_session(client, Method::PATCH, &path, &metadata, upload.size).await?;
    upload_content(client, &session, upload).await
}
