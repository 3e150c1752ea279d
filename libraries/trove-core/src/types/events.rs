//! Scan Events
//!
//! Event-based communication from the indexing pipeline to its observer.
//! Events are emitted at key points:
//! - Walker progress (rate limited, per root)
//! - Batch merges (items new or changed in the cache)
//! - Walker completion (final detailed counters)
//! - Pass completion (exactly once per accepted scan)

use crate::types::MediaItem;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Cumulative traversal counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Directories successfully listed
    pub dirs_visited: u64,
    /// Supported audio files encountered
    pub files_found: u64,
    /// Seconds since the scan started
    pub elapsed_secs: u64,
}

impl ScanProgress {
    /// Sum counters from several walkers, keeping the longest elapsed time
    pub fn merge(&mut self, other: &ScanProgress) {
        self.dirs_visited += other.dirs_visited;
        self.files_found += other.files_found;
        self.elapsed_secs = self.elapsed_secs.max(other.elapsed_secs);
    }
}

/// Per-walker outcome counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkerStats {
    /// Files whose tags were read
    pub extracted: u64,
    /// Files skipped because their fingerprint was unchanged
    pub unchanged: u64,
    /// Extraction failures (file still recorded)
    pub extract_failures: u64,
    /// Directories that could not be listed
    pub dir_errors: u64,
    /// Batches sent to the cache
    pub batches_sent: u64,
}

/// Events emitted by the indexing pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Rate-limited progress from one walker
    Progress {
        /// Root the walker owns
        root: PathBuf,
        /// Cumulative counters
        progress: ScanProgress,
    },

    /// Items merged into the cache from one batch
    ItemsChanged {
        /// Root the batch came from
        root: PathBuf,
        /// New or updated items, in discovery order
        items: Vec<MediaItem>,
    },

    /// A walker finished (normally or cancelled)
    WalkerFinished {
        /// Root the walker owned
        root: PathBuf,
        /// Final counters
        progress: ScanProgress,
        /// Outcome counters
        stats: WalkerStats,
        /// Whether a stop was requested before traversal finished
        cancelled: bool,
    },

    /// Every walker of a pass has finished and the cache was persisted
    PassComplete {
        /// Identifier of the finished pass
        pass_id: u64,
        /// Counters summed over all walkers
        progress: ScanProgress,
        /// Entries in the cache after the pass
        total_entries: usize,
        /// Entries flagged offline after the pass
        offline_entries: usize,
    },
}
