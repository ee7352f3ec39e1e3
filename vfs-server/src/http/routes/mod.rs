//! Route handlers organized by resource

pub mod directories;
pub mod files;
pub mod health;
pub mod search;
pub mod tags;

use serde::Serialize;

/// Body of successful deletes
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

impl StatusResponse {
    pub fn success() -> Self {
        Self { status: "success" }
    }
}
