//! Search schemas

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{nullable, ItemType, Metadata};

/// Which kinds of entries a search returns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    All,
    File,
    Directory,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::File => "file",
            Self::Directory => "directory",
        }
    }
}

/// POST /search
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "nullable::or_default")]
    pub kind: SearchType,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// Directory hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSearchResultDirectory {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: ItemType,
}

/// File hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSearchResultFile {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub storage_id: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub metadata: Metadata,
    #[serde(rename = "type")]
    pub kind: ItemType,
}

/// POST /search response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemSearchResponse {
    #[serde(default, deserialize_with = "nullable::compact")]
    pub directories: Vec<ItemSearchResultDirectory>,
    #[serde(default, deserialize_with = "nullable::compact")]
    pub files: Vec<ItemSearchResultFile>,
}
