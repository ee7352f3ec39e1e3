//! File and tag schemas

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{nullable, Metadata};

/// Tag names with their parallel numeric ids
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawFileTags")]
pub struct FileTags {
    pub names: Vec<String>,
    pub ids: Vec<i64>,
}

/// Tag lists as aggregated by SQL, possibly null or with null holes
#[derive(Deserialize)]
struct RawFileTags {
    #[serde(default)]
    names: Option<Vec<Option<String>>>,
    #[serde(default)]
    ids: Option<Vec<Option<i64>>>,
}

impl From<RawFileTags> for FileTags {
    /// Keeps only positions where both name and id are present.
    fn from(raw: RawFileTags) -> Self {
        let names = raw.names.unwrap_or_default();
        let ids = raw.ids.unwrap_or_default();
        let (names, ids) = names
            .into_iter()
            .zip(ids)
            .filter_map(|pair| match pair {
                (Some(name), Some(id)) => Some((name, id)),
                _ => None,
            })
            .unzip();
        Self { names, ids }
    }
}

/// Full file record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDetails {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    pub storage_id: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub metadata: Metadata,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub tags: FileTags,
}

/// POST /files
#[derive(Debug, Clone, Deserialize)]
pub struct CreateFileRequest {
    pub filename: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

/// Changes applied by PATCH /files/{id}; absent fields are unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    /// Replaces the whole tag set when present
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// PATCH /files/{id}
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateFileRequest {
    pub updates: FileUpdate,
}

/// POST, PATCH and DELETE /files/{id}/tags
#[derive(Debug, Clone, Deserialize)]
pub struct TagsRequest {
    pub tags: Vec<String>,
}
