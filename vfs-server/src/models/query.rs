//! Query-string parameters shared by the routes

use serde::Deserialize;
use uuid::Uuid;

use super::directory::DEFAULT_TREE_LEVEL;

/// Owner scope used when a request carries no token
pub const PUBLIC_USER_TOKEN: &str = "public";

fn public_token() -> String {
    PUBLIC_USER_TOKEN.to_string()
}

fn default_level() -> i32 {
    DEFAULT_TREE_LEVEL
}

/// `?user_token=`, forwarded to the database verbatim
#[derive(Debug, Clone, Deserialize)]
pub struct OwnerQuery {
    #[serde(default = "public_token")]
    pub user_token: String,
}

impl Default for OwnerQuery {
    fn default() -> Self {
        Self {
            user_token: public_token(),
        }
    }
}

/// GET /directories
#[derive(Debug, Clone, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default = "public_token")]
    pub user_token: String,
}

/// GET /directories/tree
#[derive(Debug, Clone, Deserialize)]
pub struct TreeQuery {
    #[serde(default)]
    pub parent_id: Option<Uuid>,
    #[serde(default = "default_level")]
    pub level: i32,
    #[serde(default = "public_token")]
    pub user_token: String,
}
