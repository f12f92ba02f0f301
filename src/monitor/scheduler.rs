//! Poll loop lifecycle and snapshot cache ownership.
//!
//! One monitor instance owns its whole synchronization state, so independent
//! monitors can run side by side (and under test). Two threads do the work:
//! the poll loop scans and diffs, and the debounce worker applies settled
//! changes to the index as the single writer.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        mpsc::{Receiver, RecvTimeoutError, Sender},
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::index::{IndexDatabase, IndexError};

use super::batcher::{BatchSignaler, DebounceBatcher};
use super::diff::diff;
use super::reconciler::{ReconcileOptions, reconcile_root};
use super::scanner::{ScanError, ScanOptions, scan_root};
use super::snapshot::Snapshot;

/// How long `stop()` waits for the poll loop to acknowledge shutdown.
const STOP_TIMEOUT: Duration = Duration::from_secs(3);
/// Upper bound on one sleep slice, so stop requests are noticed promptly.
const POLL_SLICE: Duration = Duration::from_millis(200);

/// Tuning knobs for a monitor instance.
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// Pause between scan cycles.
    pub poll_interval: Duration,
    /// Quiet window the debounce batcher waits for before reconciling.
    pub debounce_window: Duration,
    /// What the scanner includes.
    pub scan: ScanOptions,
    /// How change sets are applied.
    pub reconcile: ReconcileOptions,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            debounce_window: Duration::from_secs(5),
            scan: ScanOptions::default(),
            reconcile: ReconcileOptions::default(),
        }
    }
}

/// Lifecycle states of a monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// No background work is running.
    Stopped,
    /// The initial synchronous scan is in progress.
    Starting,
    /// The poll loop and debounce worker are live.
    Running,
    /// Shutdown has been requested and is being waited on.
    Stopping,
}

/// Errors surfaced by monitor lifecycle operations.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The initial scan of a root failed.
    #[error("Initial scan failed: {0}")]
    Scan(#[from] ScanError),
    /// The index could not be opened or updated.
    #[error("Index update failed: {0}")]
    Index(#[from] IndexError),
}

/// Snapshots shared between the poll loop and the writer.
///
/// `synced` is the baseline the index currently reflects, advanced only after
/// a successful reconciliation; `pending` carries the latest scan of a root
/// that has been signaled but not yet applied.
#[derive(Default)]
struct SharedSnapshots {
    synced: HashMap<PathBuf, Snapshot>,
    pending: HashMap<PathBuf, Snapshot>,
}

enum PollCommand {
    Stop,
}

/// Keeps the persisted index synchronized with a set of monitored roots.
pub struct IndexMonitor {
    db_path: PathBuf,
    roots: Vec<PathBuf>,
    options: MonitorOptions,
    state: MonitorState,
    shared: Arc<Mutex<SharedSnapshots>>,
    batcher: Option<DebounceBatcher>,
    poll_tx: Option<Sender<PollCommand>>,
    poll_done: Option<Receiver<()>>,
    poll_handle: Option<JoinHandle<()>>,
}

impl IndexMonitor {
    /// Create a monitor for the given index database and roots. Nothing runs
    /// until [`start`](Self::start) is called.
    pub fn new(db_path: impl Into<PathBuf>, roots: Vec<PathBuf>, options: MonitorOptions) -> Self {
        Self {
            db_path: db_path.into(),
            roots,
            options,
            state: MonitorState::Stopped,
            shared: Arc::new(Mutex::new(SharedSnapshots::default())),
            batcher: None,
            poll_tx: None,
            poll_done: None,
            poll_handle: None,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> MonitorState {
        self.state
    }

    /// The roots this monitor keeps in sync.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Scan every root once, reconcile the index, and spawn the background
    /// loop. Idempotent while running. On error the monitor stays stopped.
    pub fn start(&mut self) -> Result<(), MonitorError> {
        match self.state {
            MonitorState::Running | MonitorState::Starting => return Ok(()),
            MonitorState::Stopping | MonitorState::Stopped => {}
        }
        self.state = MonitorState::Starting;
        match self.start_inner() {
            Ok(()) => {
                self.state = MonitorState::Running;
                info!(roots = self.roots.len(), "Monitor running");
                Ok(())
            }
            Err(err) => {
                self.state = MonitorState::Stopped;
                Err(err)
            }
        }
    }

    fn start_inner(&mut self) -> Result<(), MonitorError> {
        let db = IndexDatabase::open(&self.db_path)?;

        // Initial full sync, synchronous so the snapshot baseline exists
        // before any background work starts.
        {
            let mut shared = lock_shared(&self.shared);
            shared.synced.clear();
            shared.pending.clear();
            for root in &self.roots {
                let snapshot = scan_root(root, &self.options.scan)?;
                reconcile_root(&db, root, &snapshot, &self.options.reconcile)?;
                shared.synced.insert(root.clone(), snapshot);
            }
        }

        let batcher = self.spawn_writer(db);
        self.spawn_poll_loop(batcher.signaler());
        self.batcher = Some(batcher);
        Ok(())
    }

    /// The debounce worker doubles as the single writer: its consumer takes
    /// the pending snapshot for the fired root and applies it.
    fn spawn_writer(&self, db: IndexDatabase) -> DebounceBatcher {
        let shared = self.shared.clone();
        let scan_options = self.options.scan.clone();
        let reconcile_options = self.options.reconcile.clone();
        DebounceBatcher::spawn(self.options.debounce_window, move |root| {
            let pending = lock_shared(&shared).pending.remove(root);
            let snapshot = match pending {
                Some(snapshot) => snapshot,
                // A direct signal (manual sync, push notification) may fire
                // without a stashed scan; take one now.
                None => match scan_root(root, &scan_options) {
                    Ok(snapshot) => snapshot,
                    Err(err) => {
                        warn!(
                            root = %root.display(),
                            error = %err,
                            "Scan for reconciliation failed"
                        );
                        return;
                    }
                },
            };
            match reconcile_root(&db, root, &snapshot, &reconcile_options) {
                Ok(_) => {
                    lock_shared(&shared).synced.insert(root.to_path_buf(), snapshot);
                }
                Err(err) => {
                    warn!(
                        root = %root.display(),
                        error = %err,
                        "Reconciliation failed; the next cycle will retry"
                    );
                    lock_shared(&shared)
                        .pending
                        .insert(root.to_path_buf(), snapshot);
                }
            }
        })
    }

    fn spawn_poll_loop(&mut self, signaler: BatchSignaler) {
        let (tx, rx) = std::sync::mpsc::channel();
        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let shared = self.shared.clone();
        let roots = self.roots.clone();
        let scan_options = self.options.scan.clone();
        let interval = self.options.poll_interval;
        let handle = std::thread::spawn(move || {
            poll_loop(&rx, interval, &roots, &shared, &scan_options, &signaler);
            let _ = done_tx.send(());
        });
        self.poll_tx = Some(tx);
        self.poll_done = Some(done_rx);
        self.poll_handle = Some(handle);
    }

    /// Stop the background loop and cancel armed debounce timers.
    ///
    /// Safe to call in any state. Blocks until the poll loop has acknowledged
    /// the request (bounded by a timeout) and any in-flight reconciliation
    /// has finished; armed timers never fire afterwards.
    pub fn stop(&mut self) {
        if self.state == MonitorState::Stopped {
            return;
        }
        self.state = MonitorState::Stopping;

        if let Some(tx) = self.poll_tx.take() {
            let _ = tx.send(PollCommand::Stop);
        }
        if let Some(done) = self.poll_done.take() {
            match done.recv_timeout(STOP_TIMEOUT) {
                Ok(()) => {
                    if let Some(handle) = self.poll_handle.take()
                        && handle.join().is_err()
                    {
                        warn!("Poll loop panicked before shutdown");
                    }
                }
                Err(_) => {
                    warn!("Poll loop did not acknowledge shutdown in time; detaching");
                    self.poll_handle = None;
                }
            }
        }

        if let Some(mut batcher) = self.batcher.take() {
            batcher.stop();
        }

        let mut shared = lock_shared(&self.shared);
        shared.pending.clear();
        shared.synced.clear();
        drop(shared);

        self.state = MonitorState::Stopped;
        info!("Monitor stopped");
    }

    /// Ask for a reconciliation of one root outside the regular poll cadence.
    ///
    /// This is the entry point for manual re-index requests and for any
    /// push-based change source. Returns false when the monitor is not
    /// running.
    pub fn request_sync(&self, root: &Path) -> bool {
        if self.state != MonitorState::Running {
            return false;
        }
        match &self.batcher {
            Some(batcher) => {
                batcher.signal(root);
                true
            }
            None => false,
        }
    }
}

impl Drop for IndexMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock_shared(shared: &Mutex<SharedSnapshots>) -> std::sync::MutexGuard<'_, SharedSnapshots> {
    shared.lock().expect("snapshot cache mutex poisoned")
}

fn poll_loop(
    rx: &Receiver<PollCommand>,
    interval: Duration,
    roots: &[PathBuf],
    shared: &Mutex<SharedSnapshots>,
    scan_options: &ScanOptions,
    signaler: &BatchSignaler,
) {
    debug!(interval_ms = interval.as_millis() as u64, "Poll loop started");
    let mut next_cycle = Instant::now() + interval;
    loop {
        let timeout = next_cycle
            .saturating_duration_since(Instant::now())
            .min(POLL_SLICE);
        match rx.recv_timeout(timeout) {
            Ok(PollCommand::Stop) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        if Instant::now() >= next_cycle {
            run_cycle(roots, shared, scan_options, signaler);
            next_cycle = Instant::now() + interval;
        }
    }
    debug!("Poll loop exited");
}

/// One detection pass over every root: scan, diff against the synced
/// baseline, and signal the batcher when something moved. Errors are logged
/// and never break the loop.
fn run_cycle(
    roots: &[PathBuf],
    shared: &Mutex<SharedSnapshots>,
    scan_options: &ScanOptions,
    signaler: &BatchSignaler,
) {
    for root in roots {
        let current = match scan_root(root, scan_options) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(
                    root = %root.display(),
                    error = %err,
                    "Scan failed; skipping root this cycle"
                );
                continue;
            }
        };
        let changed = {
            let mut guard = shared.lock().expect("snapshot cache mutex poisoned");
            let changes = match guard.synced.get(root) {
                Some(baseline) => diff(baseline, &current),
                None => diff(&Snapshot::new(), &current),
            };
            if changes.is_empty() {
                false
            } else {
                debug!(
                    root = %root.display(),
                    created = changes.created.len(),
                    modified = changes.modified.len(),
                    deleted = changes.deleted.len(),
                    "Changes detected"
                );
                guard.pending.insert(root.clone(), current);
                true
            }
        };
        if changed {
            signaler.signal(root);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn fast_options() -> MonitorOptions {
        MonitorOptions {
            poll_interval: Duration::from_millis(50),
            debounce_window: Duration::from_millis(50),
            ..MonitorOptions::default()
        }
    }

    /// Wait until the check passes or the deadline expires.
    fn wait_for(check: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        false
    }

    #[test]
    fn start_indexes_existing_files_synchronously() {
        let data = tempdir().unwrap();
        let home = tempdir().unwrap();
        fs::write(data.path().join("a.txt"), b"aaa").unwrap();
        fs::write(data.path().join("b.txt"), b"bbbb").unwrap();

        let db_path = home.path().join("index.db");
        let mut monitor =
            IndexMonitor::new(&db_path, vec![data.path().to_path_buf()], fast_options());
        monitor.start().unwrap();
        assert_eq!(monitor.state(), MonitorState::Running);

        let db = IndexDatabase::open(&db_path).unwrap();
        assert_eq!(db.count_files_under_root(data.path()).unwrap(), 2);
        let state = db.root_state(data.path()).unwrap().unwrap();
        assert_eq!(state.file_count, 2);
        monitor.stop();
        assert_eq!(monitor.state(), MonitorState::Stopped);
    }

    #[test]
    fn start_is_idempotent_while_running() {
        let data = tempdir().unwrap();
        let home = tempdir().unwrap();
        let mut monitor = IndexMonitor::new(
            home.path().join("index.db"),
            vec![data.path().to_path_buf()],
            fast_options(),
        );
        monitor.start().unwrap();
        monitor.start().unwrap();
        assert_eq!(monitor.state(), MonitorState::Running);
        monitor.stop();
    }

    #[test]
    fn start_fails_when_a_root_is_missing() {
        let home = tempdir().unwrap();
        let mut monitor = IndexMonitor::new(
            home.path().join("index.db"),
            vec![home.path().join("missing")],
            fast_options(),
        );
        let err = monitor.start();
        assert!(matches!(err, Err(MonitorError::Scan(_))));
        assert_eq!(monitor.state(), MonitorState::Stopped);
    }

    #[test]
    fn detects_created_modified_and_deleted_files() {
        let data = tempdir().unwrap();
        let home = tempdir().unwrap();
        fs::write(data.path().join("keep.txt"), b"keep").unwrap();
        fs::write(data.path().join("gone.txt"), b"gone").unwrap();

        let db_path = home.path().join("index.db");
        let mut monitor =
            IndexMonitor::new(&db_path, vec![data.path().to_path_buf()], fast_options());
        monitor.start().unwrap();

        fs::write(data.path().join("new.txt"), b"fresh").unwrap();
        fs::write(data.path().join("keep.txt"), b"keep but larger").unwrap();
        fs::remove_file(data.path().join("gone.txt")).unwrap();

        let db = IndexDatabase::open(&db_path).unwrap();
        assert!(wait_for(|| {
            db.record_for_path(&data.path().join("new.txt"))
                .unwrap()
                .is_some()
                && db
                    .record_for_path(&data.path().join("gone.txt"))
                    .unwrap()
                    .is_none()
                && db
                    .record_for_path(&data.path().join("keep.txt"))
                    .unwrap()
                    .is_some_and(|record| record.size == 15)
        }));
        assert!(wait_for(|| {
            db.root_state(data.path())
                .unwrap()
                .is_some_and(|state| state.file_count == 2)
        }));
        monitor.stop();
    }

    #[test]
    fn request_sync_applies_outside_poll_cadence() {
        let data = tempdir().unwrap();
        let home = tempdir().unwrap();
        let options = MonitorOptions {
            // Effectively no polling; only the manual signal can sync.
            poll_interval: Duration::from_secs(3600),
            debounce_window: Duration::from_millis(50),
            ..MonitorOptions::default()
        };

        let db_path = home.path().join("index.db");
        let mut monitor = IndexMonitor::new(&db_path, vec![data.path().to_path_buf()], options);
        monitor.start().unwrap();

        fs::write(data.path().join("manual.txt"), b"manual").unwrap();
        assert!(monitor.request_sync(data.path()));

        let db = IndexDatabase::open(&db_path).unwrap();
        assert!(wait_for(|| {
            db.record_for_path(&data.path().join("manual.txt"))
                .unwrap()
                .is_some()
        }));
        monitor.stop();
        assert!(!monitor.request_sync(data.path()));
    }

    #[test]
    fn stop_while_pending_never_fires_and_restart_catches_up() {
        let data = tempdir().unwrap();
        let home = tempdir().unwrap();
        let options = MonitorOptions {
            poll_interval: Duration::from_millis(50),
            // Long quiet window keeps the batch pending until stop().
            debounce_window: Duration::from_secs(3600),
            ..MonitorOptions::default()
        };

        let db_path = home.path().join("index.db");
        let mut monitor = IndexMonitor::new(&db_path, vec![data.path().to_path_buf()], options);
        monitor.start().unwrap();

        fs::write(data.path().join("late.txt"), b"late").unwrap();
        // Give the poll loop time to detect the change and arm the timer.
        std::thread::sleep(Duration::from_millis(300));
        monitor.stop();

        let db = IndexDatabase::open(&db_path).unwrap();
        assert!(
            db.record_for_path(&data.path().join("late.txt"))
                .unwrap()
                .is_none(),
            "armed timer must not fire through shutdown"
        );
        drop(db);

        // Restart performs the initial sync, which picks the file up.
        monitor.start().unwrap();
        let db = IndexDatabase::open(&db_path).unwrap();
        assert!(
            db.record_for_path(&data.path().join("late.txt"))
                .unwrap()
                .is_some()
        );
        monitor.stop();
    }

    #[test]
    fn independent_monitors_do_not_interfere() {
        let data_a = tempdir().unwrap();
        let data_b = tempdir().unwrap();
        let home = tempdir().unwrap();
        fs::write(data_a.path().join("a.txt"), b"a").unwrap();
        fs::write(data_b.path().join("b.txt"), b"b").unwrap();

        let mut first = IndexMonitor::new(
            home.path().join("first.db"),
            vec![data_a.path().to_path_buf()],
            fast_options(),
        );
        let mut second = IndexMonitor::new(
            home.path().join("second.db"),
            vec![data_b.path().to_path_buf()],
            fast_options(),
        );
        first.start().unwrap();
        second.start().unwrap();

        let first_db = IndexDatabase::open(home.path().join("first.db")).unwrap();
        let second_db = IndexDatabase::open(home.path().join("second.db")).unwrap();
        assert_eq!(first_db.count_files_under_root(data_a.path()).unwrap(), 1);
        assert_eq!(second_db.count_files_under_root(data_b.path()).unwrap(), 1);

        first.stop();
        // The second monitor keeps running after the first stops.
        fs::write(data_b.path().join("later.txt"), b"later").unwrap();
        assert!(wait_for(|| {
            second_db
                .record_for_path(&data_b.path().join("later.txt"))
                .unwrap()
                .is_some()
        }));
        second.stop();
    }
}
