//! DriveStorage - IRemoteStorage implementation for Google Drive
//!
//! Wraps the [`DriveClient`] and delegates to the client and upload modules
//! to fulfil the [`IRemoteStorage`] port contract.
//!
//! ## Design Notes
//!
//! - The client holds a fixed access token and needs no interior mutability,
//!   so it is stored directly.
//! - Retries are not done here; the sync engine retries transient
//!   [`RemoteError`](drivesync_core::ports::RemoteError)s itself.

use std::collections::HashMap;

use anyhow::Result;
use tracing::debug;

use drivesync_core::domain::{RemoteFile, RemoteId};
use drivesync_core::ports::{ContentReader, IRemoteStorage, NewItem, Page, Quota, Upload};

use crate::client::DriveClient;
use crate::files::UpdateRequest;
use crate::upload;

/// Remote storage backed by the Drive v3 REST API
#[derive(Debug, Clone)]
pub struct DriveStorage {
    client: DriveClient,
}

impl DriveStorage {
    /// Creates a new `DriveStorage` wrapping the given [`DriveClient`]
    pub fn new(client: DriveClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &DriveClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl IRemoteStorage for DriveStorage {
    async fn get_file(&self, id: &RemoteId) -> Result<RemoteFile> {
        debug!(id = %id, "DriveStorage::get_file");
        self.client.get_file(id).await
    }

    async fn list_children(&self, parent: &RemoteId, page_token: Option<&str>) -> Result<Page> {
        debug!(
            parent = %parent,
            has_token = page_token.is_some(),
            "DriveStorage::list_children"
        );
        self.client.list_children(parent, page_token).await
    }

    async fn find_sync_roots(&self) -> Result<Vec<RemoteFile>> {
        debug!("DriveStorage::find_sync_roots");
        self.client.find_sync_roots().await
    }

    async fn create_folder(&self, item: NewItem) -> Result<RemoteFile> {
        debug!(name = %item.name, parent = %item.parent, "DriveStorage::create_folder");
        self.client.create_folder(item).await
    }

    /// Uploads through a resumable session
    ///
    /// Delegates to [`upload::create_file`].
    async fn create_file(&self, item: NewItem, upload: Upload) -> Result<RemoteFile> {
        debug!(
            name = %item.name,
            parent = %item.parent,
            size = upload.size,
            "DriveStorage::create_file"
        );
        upload::create_file(&self.client, item, upload).await
    }

    /// Delegates to [`upload::update_file`].
    async fn update_file(&self, id: &RemoteId, upload: Upload) -> Result<RemoteFile> {
        debug!(id = %id, size = upload.size, "DriveStorage::update_file");
        upload::update_file(&self.client, id, upload).await
    }

    /// Drive merges `appProperties` into the existing set
    async fn set_properties(
        &self,
        id: &RemoteId,
        properties: HashMap<String, String>,
    ) -> Result<RemoteFile> {
        debug!(id = %id, count = properties.len(), "DriveStorage::set_properties");
        let patch = UpdateRequest {
            modified_time: None,
            app_properties: Some(properties),
        };
        self.client.update_metadata(id, &patch).await
    }

    async fn delete(&self, id: &RemoteId) -> Result<()> {
        debug!(id = %id, "DriveStorage::delete");
        self.client.delete(id).await?;
        debug!(id = %id, "Item deleted successfully");
        Ok(())
    }

    async fn download(&self, id: &RemoteId) -> Result<ContentReader> {
        debug!(id = %id, "DriveStorage::download");
        self.client.download(id).await
    }

    async fn quota(&self) -> Result<Quota> {
        debug!("DriveStorage::quota");
        self.client.quota().await
    }
}
