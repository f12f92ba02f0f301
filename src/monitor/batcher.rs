//! Debounced coalescing of change signals.
//!
//! Bursts of signals for a root collapse into a single reconcile trigger,
//! fired only after a quiet window with no new signal for that root. The
//! state table is separate from the timer thread so the coalescing rules can
//! be tested synchronously with injected clock readings.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::mpsc::{RecvTimeoutError, Sender},
    thread::JoinHandle,
    time::{Duration, Instant},
};

use tracing::{debug, warn};

/// Per-root pending batches, keyed by root path with the arm time.
///
/// A root is Idle (absent), Pending (present, timer armed), or Firing (being
/// handed to the consumer right now). Signals during Pending re-arm the
/// window; signals during Firing queue behind it and start a fresh Pending
/// cycle once the consumer returns, so no signal is ever dropped.
#[derive(Debug)]
pub(crate) struct BatchState {
    quiet_window: Duration,
    pending: HashMap<PathBuf, Instant>,
}

impl BatchState {
    pub(crate) fn new(quiet_window: Duration) -> Self {
        Self {
            quiet_window,
            pending: HashMap::new(),
        }
    }

    /// Record a change signal, arming or re-arming the root's quiet window.
    pub(crate) fn signal(&mut self, root: PathBuf, now: Instant) {
        self.pending.insert(root, now);
    }

    /// Earliest moment any pending root becomes due, if one is armed.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.pending
            .values()
            .min()
            .map(|armed_at| *armed_at + self.quiet_window)
    }

    /// Remove and return every root whose quiet window has fully elapsed.
    pub(crate) fn take_due(&mut self, now: Instant) -> Vec<PathBuf> {
        let due: Vec<PathBuf> = self
            .pending
            .iter()
            .filter(|(_, armed_at)| now.saturating_duration_since(**armed_at) >= self.quiet_window)
            .map(|(root, _)| root.clone())
            .collect();
        for root in &due {
            self.pending.remove(root);
        }
        due
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

enum BatcherCommand {
    Signal(PathBuf),
    Shutdown,
}

/// Cloneable handle used to feed signals into a running batcher.
#[derive(Clone)]
pub(crate) struct BatchSignaler {
    tx: Sender<BatcherCommand>,
}

impl BatchSignaler {
    /// Report a change burst for a root. Silently ignored after shutdown.
    pub(crate) fn signal(&self, root: &Path) {
        let _ = self.tx.send(BatcherCommand::Signal(root.to_path_buf()));
    }
}

/// Timer thread that owns a [`BatchState`] and drives a consumer callback.
///
/// The consumer runs on the batcher's own thread, which doubles as the
/// single serialized writer context: only one reconcile invocation is ever
/// in flight.
pub struct DebounceBatcher {
    tx: Sender<BatcherCommand>,
    handle: Option<JoinHandle<()>>,
}

impl DebounceBatcher {
    /// Spawn the worker thread with the given quiet window and consumer.
    pub fn spawn(
        quiet_window: Duration,
        mut consumer: impl FnMut(&Path) + Send + 'static,
    ) -> Self {
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = std::thread::spawn(move || {
            let mut state = BatchState::new(quiet_window);
            loop {
                let command = match state.next_deadline() {
                    Some(deadline) => {
                        let timeout = deadline.saturating_duration_since(Instant::now());
                        match rx.recv_timeout(timeout) {
                            Ok(command) => Some(command),
                            Err(RecvTimeoutError::Timeout) => None,
                            Err(RecvTimeoutError::Disconnected) => break,
                        }
                    }
                    None => match rx.recv() {
                        Ok(command) => Some(command),
                        Err(_) => break,
                    },
                };
                match command {
                    Some(BatcherCommand::Signal(root)) => {
                        debug!(root = %root.display(), "Change signal received");
                        state.signal(root, Instant::now());
                    }
                    Some(BatcherCommand::Shutdown) => break,
                    None => {}
                }
                for root in state.take_due(Instant::now()) {
                    consumer(&root);
                }
            }
            if state.pending_count() > 0 {
                debug!(
                    pending = state.pending_count(),
                    "Discarding pending batches on shutdown"
                );
            }
        });
        Self {
            tx,
            handle: Some(handle),
        }
    }

    /// Report a change burst for a root.
    pub fn signal(&self, root: &Path) {
        let _ = self.tx.send(BatcherCommand::Signal(root.to_path_buf()));
    }

    /// Handle for other threads to feed signals into this batcher.
    pub(crate) fn signaler(&self) -> BatchSignaler {
        BatchSignaler {
            tx: self.tx.clone(),
        }
    }

    /// Stop the worker, cancelling any armed timers. Blocks until an
    /// in-flight consumer invocation finishes; pending batches never fire.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.tx.send(BatcherCommand::Shutdown);
        if handle.join().is_err() {
            warn!("Debounce worker panicked during shutdown");
        }
    }
}

impl Drop for DebounceBatcher {
    fn drop(&mut self) {
        self.stop();
    }
}
