//! Transactional application of classified diffs to the persisted index.

use std::path::Path;

use tracing::info;

use crate::index::{IndexDatabase, IndexError, IndexRecord};
use crate::index::util::now_epoch_seconds;

use super::diff::{ChangeSet, diff};
use super::snapshot::{FileEntry, Snapshot};

/// Options controlling how a change set is applied.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Maximum paths per DELETE statement inside the transaction.
    pub delete_batch_size: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            delete_batch_size: 500,
        }
    }
}

/// Summary of one successful reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileResult {
    /// Records inserted.
    pub created: usize,
    /// Records updated in place.
    pub modified: usize,
    /// Records removed.
    pub deleted: usize,
    /// Files under the root after this sync.
    pub total_files: usize,
}

/// Apply a classified diff for one root as a single transaction.
///
/// Either every write lands, including the root bookkeeping update, or the
/// whole cycle rolls back and the error surfaces; the next trigger recomputes
/// the still-pending diff and retries.
pub fn apply(
    db: &IndexDatabase,
    root: &Path,
    changes: &ChangeSet,
    total_files: usize,
    options: &ReconcileOptions,
) -> Result<ReconcileResult, IndexError> {
    let now = now_epoch_seconds();
    let mut batch = db.write_batch()?;
    for entry in &changes.created {
        batch.insert_or_replace(root, &record_from_entry(entry, now))?;
    }
    for entry in &changes.modified {
        batch.update_record(&entry.path, entry.size, entry.modified_ns, now)?;
    }
    batch.remove_paths(&changes.deleted, options.delete_batch_size)?;
    batch.upsert_root_state(root, now, total_files as u64)?;
    batch.commit()?;
    Ok(ReconcileResult {
        created: changes.created.len(),
        modified: changes.modified.len(),
        deleted: changes.deleted.len(),
        total_files,
    })
}

/// Diff a fresh snapshot against what the index already holds for the root,
/// then apply the result.
///
/// Using the index itself as the comparison baseline makes the operation
/// self-healing: a cycle that failed mid-way leaves the baseline untouched,
/// so the following cycle sees the same differences again.
pub fn reconcile_root(
    db: &IndexDatabase,
    root: &Path,
    current: &Snapshot,
    options: &ReconcileOptions,
) -> Result<ReconcileResult, IndexError> {
    let previous = indexed_snapshot(db, root)?;
    let changes = diff(&previous, current);
    let result = apply(db, root, &changes, current.len(), options)?;
    if changes.is_empty() {
        info!(root = %root.display(), files = current.len(), "Index already in sync");
    } else {
        info!(
            root = %root.display(),
            created = result.created,
            modified = result.modified,
            deleted = result.deleted,
            files = result.total_files,
            "Index reconciled"
        );
    }
    Ok(result)
}

/// Drop everything indexed under the root and re-apply the full snapshot.
pub fn rebuild_root(
    db: &IndexDatabase,
    root: &Path,
    current: &Snapshot,
) -> Result<ReconcileResult, IndexError> {
    let now = now_epoch_seconds();
    let mut batch = db.write_batch()?;
    batch.clear_root(root)?;
    for entry in current.iter() {
        batch.insert_or_replace(root, &record_from_entry(entry, now))?;
    }
    batch.upsert_root_state(root, now, current.len() as u64)?;
    batch.commit()?;
    info!(root = %root.display(), files = current.len(), "Index rebuilt");
    Ok(ReconcileResult {
        created: current.len(),
        modified: 0,
        deleted: 0,
        total_files: current.len(),
    })
}

/// Reconstruct the previously synced snapshot from the index rows.
fn indexed_snapshot(db: &IndexDatabase, root: &Path) -> Result<Snapshot, IndexError> {
    let records = db.records_under_root(root)?;
    Ok(Snapshot::from_entries(records.into_iter().map(|record| {
        FileEntry {
            path: record.path,
            size: record.size,
            modified_ns: record.modified_ns,
        }
    })))
}

fn record_from_entry(entry: &FileEntry, indexed_at: i64) -> IndexRecord {
    IndexRecord {
        name: entry.name(),
        path: entry.path.clone(),
        size: entry.size,
        modified_ns: entry.modified_ns,
        indexed_at,
    }
}
