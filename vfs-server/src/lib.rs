//! vfs-server: REST API over a database-resident virtual file system
//!
//! Directory, file, tag and search logic lives in external database
//! functions. This crate pools connections, runs those functions inside
//! transactions, translates their failures and serves them over HTTP.

pub mod db;
pub mod http;
pub mod models;

pub use db::{
    DbConfig, DbError, ErrorKind, MemoryBackend, PgConnector, Pool, PoolConfig, PoolStatus,
    QueryExecutor,
};
pub use http::{build_router, run_server, ApiError, AppState, CorsConfig, ServerConfig, ServerError};
