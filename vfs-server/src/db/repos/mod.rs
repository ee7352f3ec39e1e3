//! Repositories over the external VFS functions
//!
//! Each repository follows these patterns:
//! - Builds one `Statement` per function call, arguments in contract order
//! - Decodes the single named result column, SQL NULL as absent
//! - Returns `None` for an empty result and lets the route pick the status

pub mod directories;
pub mod files;
pub mod search;
pub mod tags;

use serde::de::DeserializeOwned;

use super::{DbError, Row};

pub use directories::DirectoryRepo;
pub use files::FileRepo;
pub use search::SearchRepo;
pub use tags::TagRepo;

/// Decode one column of the first row.
pub(crate) fn first_column<T: DeserializeOwned>(
    rows: Vec<Row>,
    function: &'static str,
    column: &str,
) -> Result<Option<T>, DbError> {
    match rows.into_iter().next() {
        Some(mut row) => row.take(function, column),
        None => Ok(None),
    }
}

/// Decode the whole first row.
pub(crate) fn first_row<T: DeserializeOwned>(
    rows: Vec<Row>,
    function: &'static str,
) -> Result<Option<T>, DbError> {
    rows.into_iter()
        .next()
        .map(|row| row.into_typed(function))
        .transpose()
}
