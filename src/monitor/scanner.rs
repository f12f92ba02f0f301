use std::{
    ffi::OsStr,
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use thiserror::Error;
use tracing::{debug, warn};

use crate::index::sanitize_path;

use super::snapshot::{FileEntry, Snapshot};

/// Options controlling what a scan includes.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Include entries whose name starts with a dot. Hidden directories are
    /// not recursed into when this is off.
    pub include_hidden: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            include_hidden: false,
        }
    }
}

/// Errors that abort a scan of a root directory.
///
/// Per-file failures are deliberately absent here: an unreadable file or a
/// vanished subdirectory is logged and skipped, never fatal.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The monitored root is not a directory.
    #[error("Monitored root is not a directory: {0}")]
    InvalidRoot(PathBuf),
    /// The root itself could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
}

/// Walk a root directory and produce a snapshot of every regular file in it.
///
/// Scanning the same unchanged tree twice yields snapshots that compare equal
/// under the differ.
pub fn scan_root(root: &Path, options: &ScanOptions) -> Result<Snapshot, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::InvalidRoot(root.to_path_buf()));
    }
    let mut snapshot = Snapshot::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(source) if dir != root => {
                warn!(
                    dir = %dir.display(),
                    error = %source,
                    "Failed to read directory during scan"
                );
                continue;
            }
            Err(source) => {
                return Err(ScanError::Io {
                    path: dir.clone(),
                    source,
                });
            }
        };
        for entry_result in entries {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(
                        dir = %dir.display(),
                        error = %err,
                        "Failed to read directory entry during scan"
                    );
                    continue;
                }
            };

            let path = entry.path();
            if !options.include_hidden && is_hidden(&entry.file_name()) {
                continue;
            }
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(err) => {
                    debug!(
                        path = %path.display(),
                        error = %err,
                        "Failed to read file type during scan"
                    );
                    continue;
                }
            };
            if file_type.is_symlink() {
                continue;
            }
            if file_type.is_dir() {
                stack.push(path);
                continue;
            }
            if file_type.is_file()
                && let Some(file) = read_entry(&path)
            {
                snapshot.insert(file);
            }
        }
    }
    Ok(snapshot)
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Stat a file into a snapshot entry, or None when it cannot be read.
fn read_entry(path: &Path) -> Option<FileEntry> {
    let meta = match path.metadata() {
        Ok(meta) => meta,
        Err(err) => {
            debug!(
                path = %path.display(),
                error = %err,
                "Failed to stat file during scan"
            );
            return None;
        }
    };
    let modified = meta.modified().unwrap_or(UNIX_EPOCH);
    Some(FileEntry {
        path: sanitize_path(path),
        size: meta.len(),
        modified_ns: to_nanos(modified),
    })
}

fn to_nanos(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_nanos().min(i64::MAX as u128) as i64)
        .unwrap_or_default()
}
