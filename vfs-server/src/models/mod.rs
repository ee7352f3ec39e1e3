//! Request and response schemas
//!
//! Requests are checked for shape only (types, required fields, enums);
//! names, tags and tree depth go to the database functions as given.

pub mod validation;
pub mod nullable;
pub mod directory;
pub mod file;
pub mod search;
pub mod query;

/// Open key-value metadata attached to files
pub type Metadata = serde_json::Map<String, serde_json::Value>;

pub use validation::ValidationError;
pub use directory::{
    ChildCounts, CopyRequest, CreateDirectoryRequest, DeleteDirectoryRequest, DirectoryDetails,
    DirectoryListResponse, DirectoryTree, DirectoryTreeResponse, DirectoryUpdate, ItemType,
    ShortDetails, TreeItem, UpdateDirectoryRequest,
};
pub use file::{CreateFileRequest, FileDetails, FileTags, FileUpdate, TagsRequest, UpdateFileRequest};
pub use search::{
    ItemSearchResponse, ItemSearchResultDirectory, ItemSearchResultFile, SearchRequest,
    SearchType,
};
pub use query::{ListQuery, OwnerQuery, TreeQuery, PUBLIC_USER_TOKEN};
