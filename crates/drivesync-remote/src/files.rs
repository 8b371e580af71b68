//! Drive `File` resource mapping
//!
//! Wire types for the subset of the Drive v3 `File` resource the sync engine
//! needs, and their conversion into [`RemoteFile`]. Drive encodes 64-bit
//! integers (`size`, quota values) as JSON strings.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use drivesync_core::domain::{Fingerprint, RelPath, RemoteFile, RemoteId, FOLDER_MIME_TYPE};
use drivesync_core::ports::{NewItem, Page, Quota};
use serde::{Deserialize, Serialize};

use crate::DriveError;

/// Fields requested for every file resource
pub const FILE_FIELDS: &str =
    "id,name,mimeType,size,md5Checksum,modifiedTime,createdTime,parents,appProperties";

/// Fields requested for a children listing
pub fn list_fields() -> String {
    format!("nextPageToken,files({FILE_FIELDS})")
}

// ============================================================================
// Wire types
// ============================================================================

/// A file resource as returned by the API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: Option<String>,
    pub size: Option<String>,
    pub md5_checksum: Option<String>,
    pub modified_time: Option<DateTime<Utc>>,
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub app_properties: HashMap<String, String>,
}

/// One page of `files.list`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    pub next_page_token: Option<String>,
}

/// Response of `about.get` with `fields=storageQuota`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct About {
    pub storage_quota: Option<StorageQuota>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageQuota {
    /// Absent for unlimited accounts
    pub limit: Option<String>,
    pub usage: Option<String>,
}

/// Metadata body for creating an object
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub name: String,
    pub parents: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub app_properties: HashMap<String, String>,
}

impl From<NewItem> for CreateRequest {
    fn from(item: NewItem) -> Self {
        Self {
            name: item.name,
            parents: vec![item.parent.to_string()],
            mime_type: item.mime_type,
            modified_time: item.modified,
            app_properties: item.app_properties,
        }
    }
}

/// Metadata body for updating an object
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_properties: Option<HashMap<String, String>>,
}

/// Error envelope of a failed API call
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// Conversions
// ============================================================================

fn parse_u64(field: &str, value: Option<&str>) -> Result<u64, DriveError> {
    match value {
        None => Ok(0),
        Some(v) => v
            .parse()
            .map_err(|_| DriveError::InvalidResponse(format!("{field} is not a number: {v}"))),
    }
}

impl TryFrom<DriveFile> for RemoteFile {
    type Error = DriveError;

    fn try_from(file: DriveFile) -> Result<Self, Self::Error> {
        let id = RemoteId::new(file.id.clone())
            .map_err(|e| DriveError::InvalidResponse(e.to_string()))?;
        let mime_type = file.mime_type.unwrap_or_default();
        let md5 = file
            .md5_checksum
            .map(Fingerprint::new)
            .transpose()
            .map_err(|e| DriveError::InvalidResponse(format!("{}: {e}", file.name)))?;
        let modified = file
            .modified_time
            .ok_or_else(|| DriveError::InvalidResponse(format!("{} has no modifiedTime", file.name)))?;
        let parents = file
            .parents
            .into_iter()
            .filter_map(|p| RemoteId::new(p).ok())
            .collect();

        Ok(RemoteFile {
            id,
            rel_path: RelPath::root(),
            size: parse_u64("size", file.size.as_deref())?,
            md5,
            modified,
            created: file.created_time,
            is_dir: mime_type == FOLDER_MIME_TYPE,
            mime_type,
            name: file.name,
            parents,
            app_properties: file.app_properties,
        })
    }
}

impl FileList {
    /// Convert into a port page; entries with unusable metadata are an error
    pub fn into_page(self) -> Result<Page, DriveError> {
        let files = self
            .files
            .into_iter()
            .map(RemoteFile::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page {
            files,
            next_page_token: self.next_page_token.filter(|t| !t.is_empty()),
        })
    }
}

impl TryFrom<About> for Quota {
    type Error = DriveError;

    fn try_from(about: About) -> Result<Self, Self::Error> {
        let Some(quota) = about.storage_quota else {
            return Ok(Quota::default());
        };
        Ok(Quota {
            limit: parse_u64("storageQuota.limit", quota.limit.as_deref())?,
            usage: parse_u64("storageQuota.usage", quota.usage.as_deref())?,
        })
    }
}
