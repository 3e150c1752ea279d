//! Trove Core
//!
//! Platform-agnostic types, collaborator traits, and error handling shared by
//! the Trove indexing crates.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `MediaItem`, `Fingerprint`, `TagFields`, scan events
//! - **Collaborator Traits**: `TagExtractor`, `ScanObserver`, `DirectorySource`
//! - **Error Handling**: `TroveError`, `ExtractError` and the `Result` alias
//!
//! # Example
//!
//! ```rust
//! use trove_core::{Fingerprint, MediaItem};
//!
//! let mut item = MediaItem::new("/music/album/01 - intro.flac");
//! item.size = 4_096;
//! item.mtime = 1_700_000_000;
//!
//! assert_eq!(item.base, "/music/album");
//! assert_eq!(item.fingerprint(), Fingerprint::new(4_096, 1_700_000_000));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{ExtractError, Result, TroveError};
pub use traits::{DirectorySource, NullObserver, ScanObserver, StaticDirectories, TagExtractor};
pub use types::{
    is_supported_audio, Fingerprint, MediaItem, ScanEvent, ScanProgress, TagFields, WalkerStats,
    SUPPORTED_EXTENSIONS,
};
