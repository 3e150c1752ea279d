//! Error types for the indexer

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot encoding error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported snapshot version: {0}")]
    SnapshotVersion(u32),

    #[error("Malformed batch: {0}")]
    Batch(#[from] BatchError),

    #[error("Walker error: {0}")]
    Walker(#[from] WalkerError),

    #[error("Core error: {0}")]
    Core(#[from] trove_core::TroveError),

    #[error("Cache store is not running")]
    StoreClosed,
}

/// Batch payload failed validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("field `{field}` has {actual} values, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Error)]
pub enum WalkerError {
    #[error("walker for {} was already started", .0.display())]
    AlreadyStarted(PathBuf),

    #[error("walker for {} has already exited", .0.display())]
    Exited(PathBuf),

    #[error("failed to spawn walker thread: {0}")]
    Spawn(#[source] std::io::Error),
}
