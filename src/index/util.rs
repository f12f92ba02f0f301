use std::{
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use super::IndexError;

/// Translate rusqlite errors into friendlier IndexError variants.
pub(super) fn map_sql_error(err: rusqlite::Error) -> IndexError {
    match err {
        rusqlite::Error::SqliteFailure(sql_err, _)
            if sql_err.extended_code == rusqlite::ffi::SQLITE_BUSY =>
        {
            IndexError::Busy
        }
        rusqlite::Error::InvalidQuery
        | rusqlite::Error::InvalidParameterName(_)
        | rusqlite::Error::MultipleStatement => IndexError::Unexpected,
        other => IndexError::Sql(other),
    }
}

/// Render a path as the UTF-8 string stored in the database.
///
/// Invalid byte sequences are replaced rather than rejected, so a single
/// malformed name never aborts indexing. Callers must apply the same
/// sanitation on the scan side to keep the stored form stable.
pub(super) fn path_to_db_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Sanitize a path to the representable form used throughout the index.
///
/// Paths that are already valid UTF-8 come back unchanged; others have
/// invalid sequences replaced so scan results and stored rows agree.
pub fn sanitize_path(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(_) => path.to_path_buf(),
        None => PathBuf::from(path.to_string_lossy().into_owned()),
    }
}

/// Current wall-clock time as epoch seconds.
pub(crate) fn now_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

pub(super) fn create_parent_if_needed(path: &Path) -> Result<(), IndexError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|source| IndexError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn db_string_round_trips_for_utf8_paths() {
        let path = PathBuf::from("/data/docs/report.txt");
        assert_eq!(PathBuf::from(path_to_db_string(&path)), path);
    }

    #[test]
    fn sanitize_keeps_valid_paths_unchanged() {
        let path = PathBuf::from("/data/ordinary.txt");
        assert_eq!(sanitize_path(&path), path);
    }

    #[cfg(unix)]
    #[test]
    fn sanitize_replaces_invalid_bytes() {
        use std::ffi::OsString;
        use std::os::unix::ffi::OsStringExt;

        let raw = OsString::from_vec(vec![0x2f, 0x64, 0xff, 0x74]);
        let path = PathBuf::from(raw);
        let sanitized = sanitize_path(&path);
        assert!(sanitized.to_str().is_some());
        assert_eq!(path_to_db_string(&sanitized), sanitized.to_string_lossy());
        assert!(path_to_db_string(&path).contains('\u{FFFD}'));
    }
}
