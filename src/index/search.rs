//! Name lookups over the persisted index.
//!
//! Supports plain substring queries and `*`/`?` wildcard patterns. Matching
//! is read-only and safe to run while a reconciliation is in flight; results
//! are eventually consistent with the filesystem by design.

use std::path::PathBuf;

use rusqlite::params;

use super::util::map_sql_error;
use super::{IndexDatabase, IndexError};

/// Options controlling a name search.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum number of results returned.
    pub limit: usize,
    /// Match names byte-for-byte instead of ASCII case-insensitively.
    pub case_sensitive: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 100,
            case_sensitive: false,
        }
    }
}

/// One search result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// File name component.
    pub name: String,
    /// Absolute path of the file.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Last modified timestamp in epoch nanoseconds.
    pub modified_ns: i64,
}

impl IndexDatabase {
    /// Find indexed files whose name matches the query.
    ///
    /// A query containing `*` or `?` is treated as a wildcard pattern over the
    /// whole name; anything else matches as a substring. Results are ordered
    /// by name. An empty query returns no results.
    pub fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchHit>, IndexError> {
        if query.is_empty() || options.limit == 0 {
            return Ok(Vec::new());
        }
        let (clause, pattern) = if options.case_sensitive {
            ("name GLOB ?1", glob_pattern(query))
        } else {
            ("name LIKE ?1 ESCAPE '\\'", like_pattern(query))
        };
        let sql = format!(
            "SELECT name, path, file_size, modified_ns FROM files
             WHERE {clause} ORDER BY name ASC LIMIT ?2"
        );
        let mut stmt = self.connection.prepare(&sql).map_err(map_sql_error)?;
        let rows = stmt
            .query_map(params![pattern, options.limit as i64], |row| {
                let path: String = row.get(1)?;
                Ok(SearchHit {
                    name: row.get(0)?,
                    path: PathBuf::from(path),
                    size: row.get::<_, i64>(2)?.max(0) as u64,
                    modified_ns: row.get(3)?,
                })
            })
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;
        Ok(rows)
    }
}

fn has_wildcards(query: &str) -> bool {
    query.contains('*') || query.contains('?')
}

/// Translate a query into a LIKE pattern, escaping LIKE metacharacters in the
/// literal parts so user input never matches structurally.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    let wildcard = has_wildcards(query);
    if !wildcard {
        pattern.push('%');
    }
    for ch in query.chars() {
        match ch {
            '*' => pattern.push('%'),
            '?' => pattern.push('_'),
            '%' | '_' | '\\' => {
                pattern.push('\\');
                pattern.push(ch);
            }
            other => pattern.push(other),
        }
    }
    if !wildcard {
        pattern.push('%');
    }
    pattern
}

/// Translate a query into a GLOB pattern. GLOB compares case-sensitively and
/// already uses `*`/`?`, so only bracket classes need escaping.
fn glob_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    let wildcard = has_wildcards(query);
    if !wildcard {
        pattern.push('*');
    }
    for ch in query.chars() {
        match ch {
            '[' => pattern.push_str("[[]"),
            other => pattern.push(other),
        }
    }
    if !wildcard {
        pattern.push('*');
    }
    pattern
}
