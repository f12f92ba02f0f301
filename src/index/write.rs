use std::path::{Path, PathBuf};

use rusqlite::{params, params_from_iter};

use super::util::{map_sql_error, path_to_db_string};
use super::{IndexDatabase, IndexError, IndexRecord, IndexWriteBatch};

/// Upper bound on paths per DELETE statement, below SQLite's default
/// host-parameter limit.
pub const MAX_DELETE_CHUNK: usize = 900;

impl IndexDatabase {
    /// Start a write batch that wraps related mutations in a single transaction.
    pub fn write_batch(&self) -> Result<IndexWriteBatch<'_>, IndexError> {
        let tx = self
            .connection
            .unchecked_transaction()
            .map_err(map_sql_error)?;
        Ok(IndexWriteBatch { tx })
    }

    /// Remove a root's bookkeeping row and all of its file rows.
    pub fn forget_root(&self, root: &Path) -> Result<(), IndexError> {
        let mut batch = self.write_batch()?;
        let root_key = path_to_db_string(root);
        batch
            .tx
            .execute("DELETE FROM files WHERE root_path = ?1", params![root_key])
            .map_err(map_sql_error)?;
        batch
            .tx
            .execute("DELETE FROM roots WHERE root_path = ?1", params![root_key])
            .map_err(map_sql_error)?;
        batch.commit()
    }
}

impl<'conn> IndexWriteBatch<'conn> {
    /// Insert a file row, replacing any previous row for the same path.
    pub fn insert_or_replace(
        &mut self,
        root: &Path,
        record: &IndexRecord,
    ) -> Result<(), IndexError> {
        self.tx
            .prepare_cached(
                "INSERT INTO files (path, name, root_path, file_size, modified_ns, indexed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(path) DO UPDATE SET name = excluded.name,
                                                root_path = excluded.root_path,
                                                file_size = excluded.file_size,
                                                modified_ns = excluded.modified_ns,
                                                indexed_at = excluded.indexed_at",
            )
            .map_err(map_sql_error)?
            .execute(params![
                path_to_db_string(&record.path),
                record.name,
                path_to_db_string(root),
                record.size as i64,
                record.modified_ns,
                record.indexed_at
            ])
            .map_err(map_sql_error)?;
        Ok(())
    }

    /// Update size, modification time, and index stamp of an existing row.
    pub fn update_record(
        &mut self,
        path: &Path,
        size: u64,
        modified_ns: i64,
        indexed_at: i64,
    ) -> Result<(), IndexError> {
        self.tx
            .prepare_cached(
                "UPDATE files SET file_size = ?1, modified_ns = ?2, indexed_at = ?3
                 WHERE path = ?4",
            )
            .map_err(map_sql_error)?
            .execute(params![
                size as i64,
                modified_ns,
                indexed_at,
                path_to_db_string(path)
            ])
            .map_err(map_sql_error)?;
        Ok(())
    }

    /// Remove file rows by path, chunked to stay under the SQL parameter
    /// limit. The chunks share this batch's transaction, so the deletion is
    /// still atomic with the rest of the batch.
    pub fn remove_paths(&mut self, paths: &[PathBuf], chunk_size: usize) -> Result<(), IndexError> {
        let chunk_size = chunk_size.clamp(1, MAX_DELETE_CHUNK);
        for chunk in paths.chunks(chunk_size) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!("DELETE FROM files WHERE path IN ({placeholders})");
            self.tx
                .prepare(&sql)
                .map_err(map_sql_error)?
                .execute(params_from_iter(
                    chunk.iter().map(|path| path_to_db_string(path)),
                ))
                .map_err(map_sql_error)?;
        }
        Ok(())
    }

    /// Insert or update the bookkeeping row for a monitored root.
    pub fn upsert_root_state(
        &mut self,
        root: &Path,
        last_synced_at: i64,
        file_count: u64,
    ) -> Result<(), IndexError> {
        self.tx
            .prepare_cached(
                "INSERT INTO roots (root_path, last_synced_at, file_count)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(root_path) DO UPDATE SET last_synced_at = excluded.last_synced_at,
                                                     file_count = excluded.file_count",
            )
            .map_err(map_sql_error)?
            .execute(params![
                path_to_db_string(root),
                last_synced_at,
                file_count as i64
            ])
            .map_err(map_sql_error)?;
        Ok(())
    }

    /// Remove every file row belonging to a root within this batch.
    pub fn clear_root(&mut self, root: &Path) -> Result<(), IndexError> {
        self.tx
            .execute(
                "DELETE FROM files WHERE root_path = ?1",
                params![path_to_db_string(root)],
            )
            .map_err(map_sql_error)?;
        Ok(())
    }

    /// Commit all batched operations atomically.
    pub fn commit(self) -> Result<(), IndexError> {
        self.tx.commit().map_err(map_sql_error)?;
        Ok(())
    }
}
