use std::path::{Path, PathBuf};

use rusqlite::{OptionalExtension, Row, params};

use super::util::{map_sql_error, path_to_db_string};
use super::{IndexDatabase, IndexError, IndexRecord, RootState};

impl IndexDatabase {
    /// Fetch every indexed record belonging to a monitored root.
    pub fn records_under_root(&self, root: &Path) -> Result<Vec<IndexRecord>, IndexError> {
        let mut stmt = self
            .connection
            .prepare_cached(
                "SELECT path, name, file_size, modified_ns, indexed_at
                 FROM files WHERE root_path = ?1 ORDER BY path ASC",
            )
            .map_err(map_sql_error)?;
        let rows = stmt
            .query_map(params![path_to_db_string(root)], record_from_row)
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;
        Ok(rows)
    }

    /// Fetch just the indexed paths belonging to a monitored root.
    pub fn paths_under_root(&self, root: &Path) -> Result<Vec<PathBuf>, IndexError> {
        let mut stmt = self
            .connection
            .prepare_cached("SELECT path FROM files WHERE root_path = ?1")
            .map_err(map_sql_error)?;
        let rows = stmt
            .query_map(params![path_to_db_string(root)], |row| {
                row.get::<_, String>(0)
            })
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;
        Ok(rows.into_iter().map(PathBuf::from).collect())
    }

    /// Look up a single record by its absolute path.
    pub fn record_for_path(&self, path: &Path) -> Result<Option<IndexRecord>, IndexError> {
        self.connection
            .query_row(
                "SELECT path, name, file_size, modified_ns, indexed_at
                 FROM files WHERE path = ?1",
                params![path_to_db_string(path)],
                record_from_row,
            )
            .optional()
            .map_err(map_sql_error)
    }

    /// Number of file rows under a root.
    pub fn count_files_under_root(&self, root: &Path) -> Result<u64, IndexError> {
        let count: i64 = self
            .connection
            .query_row(
                "SELECT COUNT(*) FROM files WHERE root_path = ?1",
                params![path_to_db_string(root)],
                |row| row.get(0),
            )
            .map_err(map_sql_error)?;
        Ok(count.max(0) as u64)
    }

    /// Bookkeeping rows for every root, most recently synced first.
    pub fn list_roots(&self) -> Result<Vec<RootState>, IndexError> {
        let mut stmt = self
            .connection
            .prepare_cached(
                "SELECT root_path, last_synced_at, file_count
                 FROM roots ORDER BY last_synced_at DESC",
            )
            .map_err(map_sql_error)?;
        let rows = stmt
            .query_map([], |row| {
                let root: String = row.get(0)?;
                Ok(RootState {
                    root_path: PathBuf::from(root),
                    last_synced_at: row.get(1)?,
                    file_count: row.get::<_, i64>(2)?.max(0) as u64,
                })
            })
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;
        Ok(rows)
    }

    /// Bookkeeping row for one root, if it has ever been synced.
    pub fn root_state(&self, root: &Path) -> Result<Option<RootState>, IndexError> {
        self.connection
            .query_row(
                "SELECT root_path, last_synced_at, file_count
                 FROM roots WHERE root_path = ?1",
                params![path_to_db_string(root)],
                |row| {
                    let root: String = row.get(0)?;
                    Ok(RootState {
                        root_path: PathBuf::from(root),
                        last_synced_at: row.get(1)?,
                        file_count: row.get::<_, i64>(2)?.max(0) as u64,
                    })
                },
            )
            .optional()
            .map_err(map_sql_error)
    }
}

fn record_from_row(row: &Row<'_>) -> Result<IndexRecord, rusqlite::Error> {
    let path: String = row.get(0)?;
    Ok(IndexRecord {
        path: PathBuf::from(path),
        name: row.get(1)?,
        size: row.get::<_, i64>(2)?.max(0) as u64,
        modified_ns: row.get(3)?,
        indexed_at: row.get(4)?,
    })
}
