//! Directory schemas

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::nullable;

/// Default tree depth
pub const DEFAULT_TREE_LEVEL: i32 = 100;

/// Immediate children of a directory, by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildCounts {
    pub directories: i64,
    pub files: i64,
    pub total: i64,
}

/// Full directory record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryDetails {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub child_counts: ChildCounts,
}

/// Listing entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortDetails {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Kind of a tree or search entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    File,
    Directory,
}

/// Recursive tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeItem {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: ItemType,
    #[serde(default)]
    pub children: Option<Vec<TreeItem>>,
}

/// GET /directories
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryListResponse {
    #[serde(default, deserialize_with = "nullable::compact")]
    pub directories: Vec<ShortDetails>,
    #[serde(default, deserialize_with = "nullable::compact")]
    pub files: Vec<ShortDetails>,
}

/// Payload of GET /directories/tree, nested under `items`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryTree {
    #[serde(default, deserialize_with = "nullable::compact")]
    pub tree: Vec<TreeItem>,
}

/// GET /directories/tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectoryTreeResponse {
    pub items: DirectoryTree,
}

/// POST /directories
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDirectoryRequest {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

/// Changes applied by PATCH /directories/{id}; absent fields are unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

/// PATCH /directories/{id}
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateDirectoryRequest {
    pub updates: DirectoryUpdate,
}

/// POST /directories/{id}/copy and POST /files/{id}/copy
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CopyRequest {
    #[serde(default)]
    pub destination_parent_id: Option<Uuid>,
}

/// DELETE /directories/{id}
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DeleteDirectoryRequest {
    #[serde(default)]
    pub recursive: bool,
}
