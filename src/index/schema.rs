use rusqlite::Connection;

use super::IndexError;
use super::util::map_sql_error;

pub(super) fn apply_schema(connection: &Connection) -> Result<(), IndexError> {
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS files (
                path TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                root_path TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                modified_ns INTEGER NOT NULL,
                indexed_at INTEGER NOT NULL DEFAULT 0
             );
             CREATE TABLE IF NOT EXISTS roots (
                root_path TEXT PRIMARY KEY,
                last_synced_at INTEGER NOT NULL,
                file_count INTEGER NOT NULL
             );",
        )
        .map_err(map_sql_error)?;
    ensure_optional_columns(connection)?;
    connection
        .execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_files_name ON files(name);
             CREATE INDEX IF NOT EXISTS idx_files_root ON files(root_path);",
        )
        .map_err(map_sql_error)?;
    Ok(())
}

/// Add columns introduced after the first released schema so older databases
/// keep working without a rebuild.
fn ensure_optional_columns(connection: &Connection) -> Result<(), IndexError> {
    let mut stmt = connection
        .prepare("PRAGMA table_info(files)")
        .map_err(map_sql_error)?;
    let columns: std::collections::HashSet<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(map_sql_error)?
        .filter_map(Result::ok)
        .collect();
    if !columns.contains("indexed_at") {
        connection
            .execute(
                "ALTER TABLE files ADD COLUMN indexed_at INTEGER NOT NULL DEFAULT 0",
                [],
            )
            .map_err(map_sql_error)?;
    }
    Ok(())
}
