//! Per-root directory walker
//!
//! Each walker owns one root for one scan pass. It runs on its own thread,
//! idles until `start()` is called, walks the tree depth-first with an explicit
//! stack, skips files whose fingerprint matches the seeded prior state, reads
//! tags for the rest, and sends the results to the cache in batches.
//!
//! ```text
//! CacheStore                 Walker Thread                 Observer
//!     │  spawn + start()          │                            │
//!     │──────────────────────────>│                            │
//!     │                           │ read_dir / stat / extract  │
//!     │   WalkerMessage::Batch    │  ScanEvent::Progress       │
//!     │<──────────────────────────│───────────────────────────>│
//!     │                           │  ScanEvent::WalkerFinished │
//!     │   WalkerMessage::Done     │───────────────────────────>│
//!     │<──────────────────────────│                            │
//! ```

use crate::batch::{BatchBuffer, MediaBatch, DEFAULT_BATCH_SIZE};
use crate::error::WalkerError;
use crate::progress::{ProgressTracker, DEFAULT_PROGRESS_INTERVAL};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use trove_core::{
    is_supported_audio, ExtractError, Fingerprint, MediaItem, ScanEvent, ScanObserver, ScanProgress,
    TagExtractor, WalkerStats,
};

/// Fingerprints of previously cached files, keyed by path
pub type PriorState = HashMap<String, Fingerprint>;

/// Walker tuning
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Items per batch before an automatic flush
    pub batch_size: usize,
    /// Minimum gap between progress events
    pub progress_interval: Duration,
    /// How long dropping a handle waits for the thread to exit
    pub join_timeout: Duration,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            join_timeout: Duration::from_secs(5),
        }
    }
}

/// Messages from a walker to the cache
#[derive(Debug)]
pub enum WalkerMessage {
    /// Newly extracted items
    Batch(MediaBatch),
    /// The walker has finished and will send nothing more
    Done(WalkerReport),
}

/// Final report of one walker
#[derive(Debug, Clone)]
pub struct WalkerReport {
    pub pass_id: u64,
    pub root: PathBuf,
    pub progress: ScanProgress,
    pub stats: WalkerStats,
    pub cancelled: bool,
}

/// Lifecycle of a walker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkerState {
    /// Waiting for `start()`
    Idle,
    /// Traversing
    Scanning,
    /// Finished; the thread has exited or is about to
    Done,
}

const STATE_IDLE: u8 = 0;
const STATE_SCANNING: u8 = 1;
const STATE_DONE: u8 = 2;

impl WalkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            STATE_IDLE => Self::Idle,
            STATE_SCANNING => Self::Scanning,
            _ => Self::Done,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum WalkerControl {
    Start,
    Stop,
}

/// Owner-side handle to a walker thread
///
/// Dropping the handle requests a stop and waits a bounded time for the thread.
pub struct WalkerHandle {
    root: PathBuf,
    control_tx: Option<Sender<WalkerControl>>,
    started: AtomicBool,
    stop: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    buffer: Arc<BatchBuffer>,
    thread: Option<JoinHandle<()>>,
    /// Disconnects when the walker state is dropped on thread exit
    exited: Receiver<()>,
    join_timeout: Duration,
}

impl WalkerHandle {
    /// Spawn an idle walker for `root`
    ///
    /// The thread blocks until `start()` is called.
    pub fn spawn(
        pass_id: u64,
        root: PathBuf,
        prior: PriorState,
        extractor: Arc<dyn TagExtractor>,
        observer: Arc<dyn ScanObserver>,
        cache_tx: mpsc::UnboundedSender<WalkerMessage>,
        config: &WalkerConfig,
    ) -> Result<Self, WalkerError> {
        let (control_tx, control_rx) = bounded::<WalkerControl>(1);
        let stop = Arc::new(AtomicBool::new(false));
        let state = Arc::new(AtomicU8::new(STATE_IDLE));
        let (exited_tx, exited) = bounded::<()>(0);
        let buffer = Arc::new(BatchBuffer::new(
            root.clone(),
            config.batch_size,
            cache_tx.clone(),
        ));

        let walker = Walker {
            pass_id,
            root: root.clone(),
            prior,
            extractor,
            observer,
            cache_tx,
            buffer: Arc::clone(&buffer),
            stop: Arc::clone(&stop),
            state: Arc::clone(&state),
            progress: ProgressTracker::new(config.progress_interval),
            stats: WalkerStats::default(),
            reported: false,
            _exited: exited_tx,
        };

        let thread = thread::Builder::new()
            .name(format!("walker-{}", pass_id))
            .spawn(move || walker.run(control_rx))
            .map_err(WalkerError::Spawn)?;

        Ok(Self {
            root,
            control_tx: Some(control_tx),
            started: AtomicBool::new(false),
            stop,
            state,
            buffer,
            thread: Some(thread),
            exited,
            join_timeout: config.join_timeout,
        })
    }

    /// Signal the walker to begin traversal (non-blocking)
    ///
    /// A walker is one-shot: a second call fails.
    pub fn start(&self) -> Result<(), WalkerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(WalkerError::AlreadyStarted(self.root.clone()));
        }

        let sent = self
            .control_tx
            .as_ref()
            .is_some_and(|tx| tx.try_send(WalkerControl::Start).is_ok());

        if sent {
            Ok(())
        } else {
            Err(WalkerError::Exited(self.root.clone()))
        }
    }

    /// Request cooperative cancellation
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(tx) = &self.control_tx {
            // Wakes an idle walker; a full queue already holds Start
            let _ = tx.try_send(WalkerControl::Stop);
        }
    }

    /// Send any buffered items now
    pub fn flush(&self) -> usize {
        self.buffer.flush()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state(&self) -> WalkerState {
        WalkerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Whether the walker thread has exited
    pub fn is_finished(&self) -> bool {
        match &self.thread {
            Some(thread) => thread.is_finished(),
            None => true,
        }
    }
}

impl std::fmt::Debug for WalkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalkerHandle")
            .field("root", &self.root)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for WalkerHandle {
    fn drop(&mut self) {
        self.stop();
        self.control_tx.take();

        let Some(thread) = self.thread.take() else {
            return;
        };

        // Nothing is ever sent; disconnection means the walker is gone
        let exited = self.exited.recv_timeout(self.join_timeout);
        if let Err(RecvTimeoutError::Disconnected) = exited {
            if thread.join().is_err() {
                warn!("Walker thread for {} panicked", self.root.display());
            }
        } else {
            warn!(
                "Walker for {} did not stop within {:?}, detaching",
                self.root.display(),
                self.join_timeout
            );
        }
    }
}

/// State owned by the walker thread
struct Walker {
    pass_id: u64,
    root: PathBuf,
    prior: PriorState,
    extractor: Arc<dyn TagExtractor>,
    observer: Arc<dyn ScanObserver>,
    cache_tx: mpsc::UnboundedSender<WalkerMessage>,
    buffer: Arc<BatchBuffer>,
    stop: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    progress: ProgressTracker,
    stats: WalkerStats,
    /// Set once `Done` has been sent
    reported: bool,
    _exited: Sender<()>,
}

impl Walker {
    /// Thread body: wait for the start signal, walk, report
    fn run(mut self, control_rx: Receiver<WalkerControl>) {
        let cancelled = match control_rx.recv() {
            Ok(WalkerControl::Start) if !self.stop_requested() => {
                self.state.store(STATE_SCANNING, Ordering::SeqCst);
                self.progress.reset();
                info!("Scanning {}", self.root.display());
                self.walk()
            }
            // Stopped, or the handle went away before starting
            _ => true,
        };

        self.finish(cancelled);
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Iterative depth-first traversal; returns true if cancelled
    fn walk(&mut self) -> bool {
        let mut stack = vec![self.root.clone()];

        while let Some(dir) = stack.pop() {
            if self.stop_requested() {
                return true;
            }

            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Skipping unreadable directory {}: {}", dir.display(), e);
                    self.stats.dir_errors += 1;
                    continue;
                }
            };

            self.progress.dir_visited();
            self.report_progress();

            for entry in entries {
                if self.stop_requested() {
                    return true;
                }

                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        debug!("Failed to read entry in {}: {}", dir.display(), e);
                        continue;
                    }
                };

                if is_hidden(&entry.file_name()) {
                    continue;
                }

                let file_type = match entry.file_type() {
                    Ok(file_type) => file_type,
                    Err(e) => {
                        debug!("Failed to stat {}: {}", entry.path().display(), e);
                        continue;
                    }
                };

                if file_type.is_dir() {
                    stack.push(entry.path());
                } else {
                    self.process_file(&entry.path());
                }
            }
        }

        false
    }

    /// Evaluate one candidate file
    fn process_file(&mut self, path: &Path) {
        if !is_supported_audio(path) {
            return;
        }

        let Some(path_str) = path.to_str() else {
            debug!("Skipping non UTF-8 path {}", path.display());
            return;
        };

        // Follows file symlinks; symlinked directories are ignored
        let meta = match fs::metadata(path) {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return,
            Err(e) => {
                debug!("Failed to stat {}: {}", path.display(), e);
                return;
            }
        };

        let fingerprint = Fingerprint::from_metadata(&meta);
        self.progress.file_found();
        self.report_progress();

        if self.prior.get(path_str) == Some(&fingerprint) {
            self.stats.unchanged += 1;
            return;
        }

        let mut item = MediaItem::new(path_str);
        item.set_fingerprint(fingerprint);
        item.inode = inode(&meta);

        let extractor = &self.extractor;
        let result = panic::catch_unwind(AssertUnwindSafe(|| extractor.extract(path)))
            .unwrap_or_else(|_| {
                warn!("Tag extractor panicked on {}", path.display());
                Err(ExtractError::new(path, "extractor panicked"))
            });

        match result {
            Ok(tags) => {
                self.stats.extracted += 1;
                item.apply_tags(tags);
            }
            Err(e) => {
                debug!("{}", e);
                self.stats.extract_failures += 1;
                item.apply_tags(e.partial);
            }
        }

        if item.title.is_empty() {
            item.title = fallback_title(path);
        }

        if self.buffer.push(item) {
            self.buffer.flush();
        }
    }

    fn report_progress(&mut self) {
        if let Some(progress) = self.progress.poll() {
            self.observer.on_event(ScanEvent::Progress {
                root: self.root.clone(),
                progress,
            });
        }
    }

    fn finish(mut self, cancelled: bool) {
        self.buffer.flush();
        self.stats.batches_sent = self.buffer.batches_sent();

        let progress = self.progress.snapshot();
        info!(
            "Finished {} ({}): {} dirs, {} files, {} extracted, {} unchanged",
            self.root.display(),
            if cancelled { "cancelled" } else { "complete" },
            progress.dirs_visited,
            progress.files_found,
            self.stats.extracted,
            self.stats.unchanged
        );

        // Observer first, so the pass-complete event is always the last one
        self.observer.on_event(ScanEvent::WalkerFinished {
            root: self.root.clone(),
            progress,
            stats: self.stats,
            cancelled,
        });

        self.report_done(progress, cancelled);
    }

    fn report_done(&mut self, progress: ScanProgress, cancelled: bool) {
        self.reported = true;
        let report = WalkerReport {
            pass_id: self.pass_id,
            root: self.root.clone(),
            progress,
            stats: self.stats,
            cancelled,
        };
        self.state.store(STATE_DONE, Ordering::SeqCst);
        if self.cache_tx.send(WalkerMessage::Done(report)).is_err() {
            debug!("Cache closed before {} finished", self.root.display());
        }
    }
}

impl Drop for Walker {
    fn drop(&mut self) {
        if self.reported {
            return;
        }

        // Unwinding: the cache still waits for this walker
        warn!("Walker for {} aborted", self.root.display());
        self.buffer.flush();
        self.stats.batches_sent = self.buffer.batches_sent();
        let progress = self.progress.snapshot();
        self.report_done(progress, true);
    }
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

fn fallback_title(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Unknown")
        .to_string()
}

#[cfg(unix)]
fn inode(meta: &fs::Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.ino()
}

#[cfg(not(unix))]
fn inode(_meta: &fs::Metadata) -> u64 {
    0
}
