//! Lenient decoding for arrays built by SQL aggregates
//!
//! `array_agg` over an outer join yields `NULL` or `[NULL]` for "nothing";
//! both decode to an empty list.

use serde::{Deserialize, Deserializer};

/// Decode `null`, `[]`, or an array with null holes into a dense `Vec`.
pub fn compact<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let items = Option::<Vec<Option<T>>>::deserialize(deserializer)?;
    Ok(items.unwrap_or_default().into_iter().flatten().collect())
}

/// Decode `null` as the type's default.
pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
