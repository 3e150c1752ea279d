//! Trove Media Library Indexer
//!
//! Walks configured root directories, extracts tags from audio files, and
//! keeps a durable, incrementally updated cache of the results.
//!
//! # Features
//!
//! - One walker thread per configured root, started on demand
//! - Incremental rescans: files whose size and mtime are unchanged are never re-read
//! - Batched delivery of results to a single cache actor
//! - Offline tracking for roots that are no longer configured
//! - Atomic JSON snapshots of the cache
//!
//! # Architecture
//!
//! - `walker`: per-root traversal, staleness filter, extraction
//! - `batch`: batch wire shape and the walker-side batch buffer
//! - `progress`: rate-limited progress counters
//! - `store`: the cache actor and its handle
//! - `snapshot`: snapshot load/save
//! - `directories`: root directory lists

mod error;

pub mod batch;
pub mod directories;
pub mod progress;
pub mod snapshot;
pub mod store;
pub mod walker;

pub use batch::{BatchBuffer, MediaBatch};
pub use directories::{DirectoryFile, DirectoryList};
pub use error::{BatchError, IndexerError, WalkerError};
pub use progress::ProgressTracker;
pub use store::{CacheHandle, CacheStore, CacheStoreConfig, ScanStart};
pub use walker::{PriorState, WalkerConfig, WalkerHandle, WalkerMessage, WalkerReport, WalkerState};

/// Re-export commonly used types
pub type Result<T> = std::result::Result<T, IndexerError>;
