//! Incremental filesystem synchronization engine.
//!
//! A background poll loop scans each monitored root, diffs the fresh snapshot
//! against the last reconciled one, and hands settled change bursts to a
//! single writer that applies them to the index transactionally.

/// Debounced coalescing of per-root change signals.
pub mod batcher;
/// Snapshot comparison and change classification.
pub mod diff;
/// Transactional application of change sets to the index.
pub mod reconciler;
/// Directory walking into metadata snapshots.
pub mod scanner;
/// Poll loop lifecycle and snapshot cache ownership.
pub mod scheduler;
/// Point-in-time file metadata snapshots.
pub mod snapshot;

pub use batcher::DebounceBatcher;
pub use diff::{ChangeSet, diff};
pub use reconciler::{ReconcileOptions, ReconcileResult, apply, rebuild_root, reconcile_root};
pub use scanner::{ScanError, ScanOptions, scan_root};
pub use scheduler::{IndexMonitor, MonitorError, MonitorOptions, MonitorState};
pub use snapshot::{FileEntry, Snapshot};
