/// Collaborator traits for the indexing pipeline
use crate::error::ExtractError;
use crate::types::{ScanEvent, TagFields};
use std::path::{Path, PathBuf};

/// Tag extractor trait
///
/// Implementers read descriptive metadata from one audio file. Called from
/// walker threads, so implementations must be thread-safe.
pub trait TagExtractor: Send + Sync {
    /// Read tags and audio properties from `path`
    ///
    /// # Errors
    /// Returns an `ExtractError` carrying any partially recovered fields.
    fn extract(&self, path: &Path) -> Result<TagFields, ExtractError>;
}

/// Observer of scan events
///
/// Called from walker threads (progress, walker completion) and from the cache
/// actor (items changed, pass complete). Implementations should hand the event
/// off quickly rather than do work inline.
pub trait ScanObserver: Send + Sync {
    /// Receive one event
    fn on_event(&self, event: ScanEvent);
}

impl ScanObserver for tokio::sync::mpsc::UnboundedSender<ScanEvent> {
    fn on_event(&self, event: ScanEvent) {
        // Receiver gone means nobody is listening any more
        let _ = self.send(event);
    }
}

/// Observer that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ScanObserver for NullObserver {
    fn on_event(&self, _event: ScanEvent) {}
}

/// Source of configured root directories
///
/// Read once per scan; the returned list is a snapshot.
pub trait DirectorySource: Send + Sync {
    /// Ordered, de-duplicated root directories
    fn roots(&self) -> Vec<PathBuf>;
}

/// Fixed list of roots
#[derive(Debug, Clone, Default)]
pub struct StaticDirectories(pub Vec<PathBuf>);

impl DirectorySource for StaticDirectories {
    fn roots(&self) -> Vec<PathBuf> {
        self.0.clone()
    }
}
