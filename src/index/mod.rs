use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, Transaction};
use thiserror::Error;

/// Read-only queries over the persisted index.
pub mod read;
/// SQLite schema management for the index database.
pub mod schema;
/// Substring and wildcard search over indexed file names.
pub mod search;
/// Write-focused helpers grouped into transactions.
pub mod write;

/// Error mapping and string sanitation utilities.
pub mod util;

pub use search::{SearchHit, SearchOptions};
pub use util::sanitize_path;

/// Metadata for one indexed file, keyed by its absolute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    /// File name component, sanitized to valid UTF-8.
    pub name: String,
    /// Absolute path, sanitized to valid UTF-8.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Last modified timestamp in epoch nanoseconds.
    pub modified_ns: i64,
    /// Epoch seconds of the reconciliation that last touched this record.
    pub indexed_at: i64,
}

/// Per-root bookkeeping row updated after every reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootState {
    /// Absolute path of the monitored root.
    pub root_path: PathBuf,
    /// Epoch seconds of the last successful reconciliation.
    pub last_synced_at: i64,
    /// Number of files indexed under this root as of the last sync.
    pub file_count: u64,
}

/// Errors returned when managing the index database.
#[derive(Debug, Error)]
pub enum IndexError {
    /// SQLite query failed.
    #[error("Database query failed: {0}")]
    Sql(#[from] rusqlite::Error),
    /// Failed to create the directory that holds the database file.
    #[error("Could not write to {path}: {source}")]
    CreateDir {
        /// Path that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Database is locked or busy.
    #[error("Database is busy, please retry")]
    Busy,
    /// SQLite returned an unexpected result.
    #[error("SQLite returned an unexpected result")]
    Unexpected,
}

/// SQLite wrapper that stores file metadata for all monitored roots.
pub struct IndexDatabase {
    connection: Connection,
}

/// Groups multiple index writes into one transaction using cached statements.
pub struct IndexWriteBatch<'conn> {
    tx: Transaction<'conn>,
}

impl IndexDatabase {
    /// Open (or create) the index database at the given file path.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let db_path = db_path.as_ref();
        util::create_parent_if_needed(db_path)?;
        let connection = Connection::open(db_path)?;
        let db = Self { connection };
        db.apply_pragmas()?;
        schema::apply_schema(&db.connection)?;
        Ok(db)
    }

    /// Open an existing index in read-only mode without applying migrations.
    pub fn open_read_only(db_path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let connection =
            Connection::open_with_flags(db_path.as_ref(), OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let db = Self { connection };
        db.apply_read_only_pragmas()?;
        Ok(db)
    }

    fn apply_pragmas(&self) -> Result<(), IndexError> {
        self.connection
            .execute_batch(
                "PRAGMA journal_mode=WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout=5000;
             PRAGMA temp_store=MEMORY;
             PRAGMA cache_size=-32000;",
            )
            .map_err(util::map_sql_error)?;
        Ok(())
    }

    fn apply_read_only_pragmas(&self) -> Result<(), IndexError> {
        self.connection
            .execute_batch(
                "PRAGMA busy_timeout=5000;
             PRAGMA temp_store=MEMORY;
             PRAGMA cache_size=-32000;",
            )
            .map_err(util::map_sql_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(path: &str, size: u64) -> IndexRecord {
        IndexRecord {
            name: Path::new(path)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: PathBuf::from(path),
            size,
            modified_ns: 1_000,
            indexed_at: 50,
        }
    }

    #[test]
    fn records_round_trip() {
        let dir = tempdir().unwrap();
        let db = IndexDatabase::open(dir.path().join("index.db")).unwrap();
        let root = Path::new("/data");

        let mut batch = db.write_batch().unwrap();
        batch
            .insert_or_replace(root, &record("/data/a.txt", 100))
            .unwrap();
        batch
            .insert_or_replace(root, &record("/data/sub/b.txt", 200))
            .unwrap();
        batch.commit().unwrap();

        let records = db.records_under_root(root).unwrap();
        assert_eq!(records.len(), 2);
        let paths = db.paths_under_root(root).unwrap();
        assert!(paths.contains(&PathBuf::from("/data/a.txt")));
        assert!(paths.contains(&PathBuf::from("/data/sub/b.txt")));
    }

    #[test]
    fn read_only_open_sees_existing_rows() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("index.db");
        let db = IndexDatabase::open(&db_path).unwrap();
        let mut batch = db.write_batch().unwrap();
        batch
            .insert_or_replace(Path::new("/data"), &record("/data/a.txt", 100))
            .unwrap();
        batch.commit().unwrap();

        let read_only = IndexDatabase::open_read_only(&db_path).unwrap();
        let records = read_only.records_under_root(Path::new("/data")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "a.txt");
    }

    #[test]
    fn parent_directory_is_created_on_open() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("index.db");
        let _db = IndexDatabase::open(&db_path).unwrap();
        assert!(db_path.is_file());
    }

    #[test]
    fn applies_workload_pragmas() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("index.db");
        let _db = IndexDatabase::open(&db_path).unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");

        let busy_timeout: i64 = conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(busy_timeout, 5000);
    }
}
