//! Cache Store
//!
//! The cache store owns the canonical path -> item map. It runs as a single
//! tokio task: every mutation (handle commands, walker batches, walker
//! completion) is processed one message at a time, so the map needs no lock.
//!
//! A scan pass spawns one walker per configured root. The pass finishes when
//! the last walker reports done; the store then flags entries outside the
//! pass's roots as offline, saves a snapshot and emits `PassComplete`.

use crate::snapshot::{load_snapshot, save_snapshot};
use crate::walker::{PriorState, WalkerConfig, WalkerHandle, WalkerMessage, WalkerReport};
use crate::{IndexerError, MediaBatch, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use trove_core::{
    DirectorySource, MediaItem, ScanEvent, ScanObserver, ScanProgress, TagExtractor, TroveError,
};

/// Cache store settings
#[derive(Debug, Clone)]
pub struct CacheStoreConfig {
    /// Snapshot file location
    pub snapshot_path: PathBuf,
    /// Settings handed to every walker
    pub walker: WalkerConfig,
}

impl CacheStoreConfig {
    pub fn new(snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: snapshot_path.into(),
            walker: WalkerConfig::default(),
        }
    }
}

/// Outcome of a scan request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStart {
    /// A new pass was started over these roots
    Started { pass_id: u64, roots: Vec<PathBuf> },
    /// A pass is already running; nothing was done
    AlreadyRunning,
}

/// Bookkeeping for the pass in flight
struct ActivePass {
    id: u64,
    roots: Vec<PathBuf>,
    walkers: Vec<WalkerHandle>,
    active: usize,
    progress: ScanProgress,
    started: Instant,
}

/// Canonical media cache
pub struct CacheStore {
    config: CacheStoreConfig,
    entries: HashMap<String, MediaItem>,
    directories: Arc<dyn DirectorySource>,
    extractor: Arc<dyn TagExtractor>,
    observer: Arc<dyn ScanObserver>,
    walker_tx: mpsc::UnboundedSender<WalkerMessage>,
    walker_rx: Option<mpsc::UnboundedReceiver<WalkerMessage>>,
    pass: Option<ActivePass>,
    next_pass_id: u64,
}

impl CacheStore {
    pub fn new(
        config: CacheStoreConfig,
        directories: Arc<dyn DirectorySource>,
        extractor: Arc<dyn TagExtractor>,
        observer: Arc<dyn ScanObserver>,
    ) -> Self {
        let (walker_tx, walker_rx) = mpsc::unbounded_channel();
        Self {
            config,
            entries: HashMap::new(),
            directories,
            extractor,
            observer,
            walker_tx,
            walker_rx: Some(walker_rx),
            pass: None,
            next_pass_id: 1,
        }
    }

    /// Run the store on the current tokio runtime
    pub fn spawn(mut self) -> CacheHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let walker_rx = self.walker_rx.take();

        let task = tokio::spawn(async move {
            if let Some(walker_rx) = walker_rx {
                self.run(commands_rx, walker_rx).await;
            }
        });

        CacheHandle {
            commands: commands_tx,
            task: Arc::new(std::sync::Mutex::new(Some(task))),
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<CacheCommand>,
        mut walker_rx: mpsc::UnboundedReceiver<WalkerMessage>,
    ) {
        debug!("Cache store started");

        loop {
            tokio::select! {
                biased;

                Some(message) = walker_rx.recv() => self.handle_walker_message(message),

                command = commands.recv() => match command {
                    Some(CacheCommand::Shutdown { reply }) => {
                        self.shutdown();
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        self.shutdown();
                        break;
                    }
                },
            }
        }

        debug!("Cache store stopped");
    }

    fn handle_command(&mut self, command: CacheCommand) {
        match command {
            CacheCommand::LoadCache { reply } => {
                let _ = reply.send(self.load_cache());
            }
            CacheCommand::SaveCache { reply } => {
                let _ = reply.send(self.save_cache());
            }
            CacheCommand::StartScan { reply } => {
                let _ = reply.send(self.start_scan());
            }
            CacheCommand::StopScan { reply } => {
                self.stop_scan();
                let _ = reply.send(());
            }
            CacheCommand::AddOrUpdate { item, reply } => {
                self.add_or_update_entry(item);
                let _ = reply.send(());
            }
            CacheCommand::Entries { reply } => {
                let _ = reply.send(self.entries());
            }
            CacheCommand::AllEntries { reply } => {
                let _ = reply.send(self.all_entries());
            }
            CacheCommand::IsScanning { reply } => {
                let _ = reply.send(self.is_scanning());
            }
            CacheCommand::Shutdown { reply } => {
                self.shutdown();
                let _ = reply.send(());
            }
        }
    }

    /// Replace the map with the persisted snapshot; returns the entry count
    ///
    /// Ignored while a pass is running, since walkers were seeded from the
    /// current map.
    pub fn load_cache(&mut self) -> usize {
        if self.is_scanning() {
            warn!("Ignoring cache load while a scan is running");
            return self.entries.len();
        }

        let path = &self.config.snapshot_path;
        self.entries = run_blocking(|| load_snapshot(path));
        self.entries.len()
    }

    /// Persist the full map
    pub fn save_cache(&self) -> Result<()> {
        run_blocking(|| save_snapshot(&self.config.snapshot_path, &self.entries))?;
        info!(
            "Saved {} entries to {}",
            self.entries.len(),
            self.config.snapshot_path.display()
        );
        Ok(())
    }

    /// Begin a scan pass over the currently configured roots
    pub fn start_scan(&mut self) -> Result<ScanStart> {
        if self.pass.is_some() {
            debug!("Scan requested while a pass is running");
            return Ok(ScanStart::AlreadyRunning);
        }

        let roots = dedup_roots(self.directories.roots());
        let pass_id = self.next_pass_id;
        self.next_pass_id += 1;

        info!("Starting scan pass {} over {} roots", pass_id, roots.len());

        let mut walkers = Vec::with_capacity(roots.len());
        for root in &roots {
            let prior = self.prior_state(root);
            debug!(
                "Seeding walker for {} with {} known files",
                root.display(),
                prior.len()
            );

            let spawned = WalkerHandle::spawn(
                pass_id,
                root.clone(),
                prior,
                Arc::clone(&self.extractor),
                Arc::clone(&self.observer),
                self.walker_tx.clone(),
                &self.config.walker,
            );

            match spawned {
                Ok(walker) => walkers.push(walker),
                Err(e) => {
                    // Stop what was spawned so far; their Done reports are ignored
                    for walker in &walkers {
                        walker.stop();
                    }
                    release_walkers(walkers);
                    return Err(e.into());
                }
            }
        }

        for walker in &walkers {
            if let Err(e) = walker.start() {
                // The thread already reported done, so the barrier still holds
                warn!("{}", e);
            }
        }

        self.pass = Some(ActivePass {
            id: pass_id,
            roots: roots.clone(),
            active: walkers.len(),
            walkers,
            progress: ScanProgress::default(),
            started: Instant::now(),
        });

        if roots.is_empty() {
            self.finish_pass();
        }

        Ok(ScanStart::Started { pass_id, roots })
    }

    /// Ask every walker of the running pass to stop
    ///
    /// The pass still completes once each walker has reported done.
    pub fn stop_scan(&self) {
        if let Some(pass) = &self.pass {
            info!("Stopping scan pass {}", pass.id);
            for walker in &pass.walkers {
                walker.stop();
            }
        }
    }

    /// Insert or overwrite the entry for `item.path`
    pub fn add_or_update_entry(&mut self, item: MediaItem) {
        self.entries.insert(item.path.clone(), item);
    }

    pub fn entries(&self) -> HashMap<String, MediaItem> {
        self.entries.clone()
    }

    /// Every entry, sorted by path
    pub fn all_entries(&self) -> Vec<MediaItem> {
        let mut items: Vec<MediaItem> = self.entries.values().cloned().collect();
        items.sort_by(|a, b| a.path.cmp(&b.path));
        items
    }

    pub fn is_scanning(&self) -> bool {
        self.pass.is_some()
    }

    /// Stop walkers and abandon the running pass
    fn shutdown(&mut self) {
        if let Some(pass) = self.pass.take() {
            info!("Abandoning scan pass {} on shutdown", pass.id);
            for walker in &pass.walkers {
                walker.stop();
            }
            release_walkers(pass.walkers);
        }
    }

    fn handle_walker_message(&mut self, message: WalkerMessage) {
        match message {
            WalkerMessage::Batch(batch) => self.merge_batch(batch),
            WalkerMessage::Done(report) => self.walker_done(report),
        }
    }

    fn merge_batch(&mut self, batch: MediaBatch) {
        let root = batch.root.clone();
        let items = match batch.into_items() {
            Ok(items) => items,
            Err(e) => {
                warn!("Dropping malformed batch from {}: {}", root.display(), e);
                return;
            }
        };

        if items.is_empty() {
            return;
        }

        debug!("Merging {} items from {}", items.len(), root.display());
        for item in &items {
            self.add_or_update_entry(item.clone());
        }

        self.observer.on_event(ScanEvent::ItemsChanged { root, items });
    }

    fn walker_done(&mut self, report: WalkerReport) {
        let Some(pass) = self.pass.as_mut() else {
            debug!("Walker report for {} outside a pass", report.root.display());
            return;
        };

        if report.pass_id != pass.id {
            debug!(
                "Ignoring walker report from pass {} during pass {}",
                report.pass_id, pass.id
            );
            return;
        }

        pass.progress.merge(&report.progress);
        pass.active = pass.active.saturating_sub(1);
        debug!(
            "Walker for {} done, {} still active",
            report.root.display(),
            pass.active
        );

        if pass.active == 0 {
            self.finish_pass();
        }
    }

    /// Close the running pass: offline marking, save, notification
    fn finish_pass(&mut self) {
        let Some(pass) = self.pass.take() else {
            return;
        };
        release_walkers(pass.walkers);

        let offline_entries = self.mark_offline(&pass.roots);

        if let Err(e) = self.save_cache() {
            error!("Failed to save cache after pass {}: {}", pass.id, e);
        }

        let mut progress = pass.progress;
        progress.elapsed_secs = pass.started.elapsed().as_secs();

        info!(
            "Scan pass {} complete: {} entries ({} offline), {} files in {} dirs, {}s",
            pass.id,
            self.entries.len(),
            offline_entries,
            progress.files_found,
            progress.dirs_visited,
            progress.elapsed_secs
        );

        self.observer.on_event(ScanEvent::PassComplete {
            pass_id: pass.id,
            progress,
            total_entries: self.entries.len(),
            offline_entries,
        });
    }

    /// Flag entries under none of `roots` as offline and the rest as online;
    /// returns the offline count
    fn mark_offline(&mut self, roots: &[PathBuf]) -> usize {
        let mut offline = 0;
        for item in self.entries.values_mut() {
            item.offline = !roots.iter().any(|root| item.is_under(root));
            if item.offline {
                offline += 1;
            }
        }
        offline
    }

    fn prior_state(&self, root: &Path) -> PriorState {
        self.entries
            .values()
            .filter(|item| item.is_under(root))
            .map(|item| (item.path.clone(), item.fingerprint()))
            .collect()
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("snapshot_path", &self.config.snapshot_path)
            .field("entries", &self.entries.len())
            .field("scanning", &self.is_scanning())
            .finish()
    }
}

fn dedup_roots(roots: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut unique = Vec::with_capacity(roots.len());
    for root in roots {
        if !unique.contains(&root) {
            unique.push(root);
        }
    }
    unique
}

/// Drop walker handles off the async executor
///
/// Dropping a handle waits for its thread, which must not stall the store task.
fn release_walkers(walkers: Vec<WalkerHandle>) {
    if walkers.is_empty() {
        return;
    }

    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn_blocking(move || drop(walkers));
        }
        Err(_) => drop(walkers),
    }
}

/// Run file I/O from the store task
///
/// On a multi-threaded runtime the worker hands its other tasks off while
/// blocked. A current-thread runtime has nowhere to move them.
fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    use tokio::runtime::{Handle, RuntimeFlavor};

    match Handle::try_current() {
        Ok(runtime) if runtime.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// Requests accepted by the store task
enum CacheCommand {
    LoadCache {
        reply: oneshot::Sender<usize>,
    },
    SaveCache {
        reply: oneshot::Sender<Result<()>>,
    },
    StartScan {
        reply: oneshot::Sender<Result<ScanStart>>,
    },
    StopScan {
        reply: oneshot::Sender<()>,
    },
    AddOrUpdate {
        item: MediaItem,
        reply: oneshot::Sender<()>,
    },
    Entries {
        reply: oneshot::Sender<HashMap<String, MediaItem>>,
    },
    AllEntries {
        reply: oneshot::Sender<Vec<MediaItem>>,
    },
    IsScanning {
        reply: oneshot::Sender<bool>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to a running cache store
///
/// Every method fails with `IndexerError::StoreClosed` once the store task has
/// stopped.
#[derive(Clone)]
pub struct CacheHandle {
    commands: mpsc::UnboundedSender<CacheCommand>,
    task: Arc<std::sync::Mutex<Option<JoinHandle<()>>>>,
}

impl CacheHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> CacheCommand,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| IndexerError::StoreClosed)?;
        response.await.map_err(|_| IndexerError::StoreClosed)
    }

    /// Load the snapshot; returns the number of cached entries
    pub async fn load_cache(&self) -> Result<usize> {
        self.request(|reply| CacheCommand::LoadCache { reply }).await
    }

    pub async fn save_cache(&self) -> Result<()> {
        self.request(|reply| CacheCommand::SaveCache { reply })
            .await?
    }

    pub async fn start_scan(&self) -> Result<ScanStart> {
        self.request(|reply| CacheCommand::StartScan { reply })
            .await?
    }

    pub async fn stop_scan(&self) -> Result<()> {
        self.request(|reply| CacheCommand::StopScan { reply }).await
    }

    /// Insert or overwrite one entry; the path must be non-empty
    pub async fn add_or_update(&self, item: MediaItem) -> Result<()> {
        if item.path.is_empty() {
            return Err(TroveError::invalid_input("media item has an empty path").into());
        }

        self.request(|reply| CacheCommand::AddOrUpdate { item, reply })
            .await
    }

    /// Copy of the path -> item map
    pub async fn entries(&self) -> Result<HashMap<String, MediaItem>> {
        self.request(|reply| CacheCommand::Entries { reply }).await
    }

    /// Copy of every entry, sorted by path
    pub async fn all_entries(&self) -> Result<Vec<MediaItem>> {
        self.request(|reply| CacheCommand::AllEntries { reply }).await
    }

    pub async fn is_scanning(&self) -> Result<bool> {
        self.request(|reply| CacheCommand::IsScanning { reply }).await
    }

    /// Stop any running pass and end the store task
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| CacheCommand::Shutdown { reply })
            .await?;

        let task = self
            .task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Cache store task failed: {}", e);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for CacheHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHandle")
            .field("closed", &self.commands.is_closed())
            .finish()
    }
}
