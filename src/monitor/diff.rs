use std::path::PathBuf;

use super::snapshot::{FileEntry, Snapshot};

/// Classified difference between two snapshots of one root.
///
/// The three sets are disjoint on path by construction. Unchanged files are
/// never reported.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Files present now that were absent before.
    pub created: Vec<FileEntry>,
    /// Files present in both snapshots whose size or mtime differs.
    pub modified: Vec<FileEntry>,
    /// Paths present before that are absent now.
    pub deleted: Vec<PathBuf>,
}

impl ChangeSet {
    /// True when nothing was created, modified, or deleted.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Total number of reported changes.
    pub fn change_count(&self) -> usize {
        self.created.len() + self.modified.len() + self.deleted.len()
    }
}

/// Compare two snapshots and classify every path.
///
/// A file counts as modified only when its size or modification time moved;
/// a rewrite that preserves both is invisible on purpose, since stat metadata
/// is the sole change oracle.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> ChangeSet {
    let mut changes = ChangeSet::default();
    for entry in current.iter() {
        match previous.get(&entry.path) {
            None => changes.created.push(entry.clone()),
            Some(prev) if prev.size != entry.size || prev.modified_ns != entry.modified_ns => {
                changes.modified.push(entry.clone());
            }
            Some(_) => {}
        }
    }
    for path in previous.paths() {
        if !current.contains(path) {
            changes.deleted.push(path.clone());
        }
    }
    changes.created.sort_by(|a, b| a.path.cmp(&b.path));
    changes.modified.sort_by(|a, b| a.path.cmp(&b.path));
    changes.deleted.sort();
    changes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, size: u64, modified_ns: i64) -> FileEntry {
        FileEntry {
            path: PathBuf::from(path),
            size,
            modified_ns,
        }
    }

    #[test]
    fn identical_snapshots_diff_empty() {
        let snapshot =
            Snapshot::from_entries([entry("/data/a.txt", 100, 100), entry("/data/b.txt", 200, 100)]);
        let changes = diff(&snapshot, &snapshot);
        assert!(changes.is_empty());
        assert_eq!(changes.change_count(), 0);
    }

    #[test]
    fn first_scan_reports_everything_created() {
        let current =
            Snapshot::from_entries([entry("/data/a.txt", 100, 100), entry("/data/b.txt", 200, 100)]);
        let changes = diff(&Snapshot::new(), &current);
        assert_eq!(changes.created.len(), 2);
        assert!(changes.modified.is_empty());
        assert!(changes.deleted.is_empty());
    }

    #[test]
    fn classifies_created_modified_deleted() {
        let previous =
            Snapshot::from_entries([entry("/data/a.txt", 100, 100), entry("/data/b.txt", 200, 100)]);
        let current =
            Snapshot::from_entries([entry("/data/b.txt", 300, 150), entry("/data/c.txt", 50, 160)]);

        let changes = diff(&previous, &current);
        assert_eq!(changes.created.len(), 1);
        assert_eq!(changes.created[0].path, PathBuf::from("/data/c.txt"));
        assert_eq!(changes.modified.len(), 1);
        assert_eq!(changes.modified[0].path, PathBuf::from("/data/b.txt"));
        assert_eq!(changes.deleted, vec![PathBuf::from("/data/a.txt")]);
    }

    #[test]
    fn size_change_alone_counts_as_modified() {
        let previous = Snapshot::from_entries([entry("/data/a.txt", 100, 100)]);
        let current = Snapshot::from_entries([entry("/data/a.txt", 101, 100)]);
        assert_eq!(diff(&previous, &current).modified.len(), 1);
    }

    #[test]
    fn mtime_change_alone_counts_as_modified() {
        let previous = Snapshot::from_entries([entry("/data/a.txt", 100, 100)]);
        let current = Snapshot::from_entries([entry("/data/a.txt", 100, 101)]);
        assert_eq!(diff(&previous, &current).modified.len(), 1);
    }

    #[test]
    fn same_size_and_mtime_is_unchanged() {
        let previous = Snapshot::from_entries([entry("/data/a.txt", 100, 100)]);
        let current = Snapshot::from_entries([entry("/data/a.txt", 100, 100)]);
        assert!(diff(&previous, &current).is_empty());
    }

    #[test]
    fn output_is_sorted_by_path() {
        let current = Snapshot::from_entries([
            entry("/data/c.txt", 1, 1),
            entry("/data/a.txt", 1, 1),
            entry("/data/b.txt", 1, 1),
        ]);
        let changes = diff(&Snapshot::new(), &current);
        let created: Vec<_> = changes.created.iter().map(|e| e.path.clone()).collect();
        assert_eq!(
            created,
            vec![
                PathBuf::from("/data/a.txt"),
                PathBuf::from("/data/b.txt"),
                PathBuf::from("/data/c.txt")
            ]
        );
    }
}
