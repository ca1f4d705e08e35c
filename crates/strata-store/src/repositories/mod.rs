//! Repository implementations for `SQLite` database operations.
//!
//! Each repository is a stateless struct whose methods take a `&Connection`
//! parameter. This makes every operation a pure function from
//! (connection, input) → output, trivially testable in isolation, and lets
//! callers compose several repository calls inside one transaction.

pub mod edge;
pub mod entity;
pub mod event;
pub mod fact;
pub mod learning;
pub mod stats;
pub mod summary;
pub mod topic;

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use strata_core::time;

/// A stored value that does not decode into its domain type.
#[derive(Debug, thiserror::Error)]
#[error("unrecognised value '{0}'")]
struct BadValue(String);

fn conversion_error(idx: usize, ty: Type, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

/// Decode a `TEXT` column through a `parse` function (enum columns).
pub(crate) fn enum_col<T>(
    row: &Row<'_>,
    idx: usize,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| conversion_error(idx, Type::Text, BadValue(raw)))
}

/// Decode an RFC 3339 timestamp column.
pub(crate) fn ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    Ok(time::from_db(&raw))
}

/// Decode a nullable timestamp column.
pub(crate) fn opt_ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    Ok(time::opt_from_db(raw.as_deref()))
}

/// Decode a nullable embedding BLOB column.
pub(crate) fn vec_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Vec<f32>>> {
    let raw: Option<Vec<u8>> = row.get(idx)?;
    raw.map(|b| strata_embeddings::blob_to_f32_vec(&b))
        .transpose()
        .map_err(|e| conversion_error(idx, Type::Blob, e))
}

/// Decode a JSON `TEXT` column.
pub(crate) fn json_col<T: serde::de::DeserializeOwned>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, Type::Text, e))
}

/// Encode an optional embedding for a BLOB column.
pub(crate) fn blob(v: Option<&Vec<f32>>) -> Option<Vec<u8>> {
    v.map(|v| strata_embeddings::f32_slice_to_blob(v))
}

/// Clamp a `usize` limit into an `SQLite` integer.
pub(crate) fn sql_limit(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Collect a string column query into typed IDs.
pub(crate) fn id_list<T: From<String>>(
    conn: &rusqlite::Connection,
    sql: &str,
    key: &str,
) -> rusqlite::Result<Vec<T>> {
    let mut stmt = conn.prepare_cached(sql)?;
    stmt.query_map([key], |row| row.get::<_, String>(0).map(T::from))?
        .collect()
}

/// Run a `SELECT COUNT(*)` style query.
pub(crate) fn count(conn: &rusqlite::Connection, sql: &str) -> crate::errors::Result<u64> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(u64::try_from(n).unwrap_or(0))
}
