//! Database layer - connection pool, executor and repositories
//!
//! # Design Principles
//!
//! - One pool per process, injected as state - no global connection
//! - Every call is a single external function; no SQL logic lives here
//! - Acquisition is retried, statements never are
//! - Multi-call operations share one transaction

pub mod error;
pub mod executor;
pub mod memory;
pub mod pool;
pub mod postgres;
pub mod repos;
pub mod statement;

pub use error::{DbError, ErrorKind};
pub use executor::QueryExecutor;
pub use memory::MemoryBackend;
pub use pool::{Connection, Connector, Lease, Pool, PoolConfig, PoolStatus};
pub use postgres::{DbConfig, PgConnector};
pub use repos::*;
pub use statement::{Param, Row, Shape, Statement};
