//! Substring search over indexed file names.
//!
//! A term matches when it occurs as a contiguous run anywhere in the file's
//! base name (never the directory part). Matching is ASCII case-insensitive,
//! which is SQLite's `LIKE` semantics. Results come back in whatever order
//! the store yields them, capped at the requested limit.

use crate::core::error::Result;
use crate::storage::record::FileRecord;
use crate::storage::store::{row_to_record, IndexStore};
use rusqlite::params;

pub use crate::core::config::DEFAULT_RESULT_LIMIT;

const ESCAPE_CHAR: char = '\\';

const SEARCH_PATHS_SQL: &str = "SELECT path FROM files WHERE name LIKE ?1 ESCAPE '\\' LIMIT ?2";
const SEARCH_RECORDS_SQL: &str =
    "SELECT path, name, ext, mtime FROM files WHERE name LIKE ?1 ESCAPE '\\' LIMIT ?2";

/// Paths of files whose name contains `term`, at most `limit` of them.
///
/// An empty term or a zero limit returns an empty list without touching the
/// store. Store failures are errors, never an empty result.
pub fn search(store: &IndexStore, term: &str, limit: usize) -> Result<Vec<String>> {
    let Some(pattern) = like_pattern(term, limit) else {
        return Ok(Vec::new());
    };

    let mut stmt = store.connection().prepare_cached(SEARCH_PATHS_SQL)?;
    let paths = stmt
        .query_map(params![pattern, sql_limit(limit)], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    tracing::trace!(term, limit, hits = paths.len(), "search");
    Ok(paths)
}

/// Like [`search`], returning full records
pub fn search_records(store: &IndexStore, term: &str, limit: usize) -> Result<Vec<FileRecord>> {
    let Some(pattern) = like_pattern(term, limit) else {
        return Ok(Vec::new());
    };

    let mut stmt = store.connection().prepare_cached(SEARCH_RECORDS_SQL)?;
    let records = stmt
        .query_map(params![pattern, sql_limit(limit)], row_to_record)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(records)
}

impl IndexStore {
    /// See [`search`]
    pub fn search(&self, term: &str, limit: usize) -> Result<Vec<String>> {
        search(self, term, limit)
    }
}

fn like_pattern(term: &str, limit: usize) -> Option<String> {
    if term.is_empty() || limit == 0 {
        return None;
    }
    Some(format!("%{}%", escape_like(term)))
}

/// Escape `LIKE` wildcards so the term matches literally
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | ESCAPE_CHAR) {
            escaped.push(ESCAPE_CHAR);
        }
        escaped.push(c);
    }
    escaped
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
