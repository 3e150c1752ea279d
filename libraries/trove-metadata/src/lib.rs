//! Trove Metadata
//!
//! Tag extraction for the Trove indexer, backed by `lofty`.
//!
//! This crate provides:
//! - Tag reading from audio files (MP3, FLAC, OGG, WAV, AAC, M4A, OPUS, WMA)
//! - Audio property extraction (duration, bitrate)
//! - MusicBrainz identifier extraction
//! - Partial recovery when audio properties cannot be parsed
//!
//! # Example
//!
//! ```rust,no_run
//! use trove_core::TagExtractor;
//! use trove_metadata::LoftyTagExtractor;
//! use std::path::Path;
//!
//! let extractor = LoftyTagExtractor::new();
//! match extractor.extract(Path::new("/music/song.mp3")) {
//!     Ok(tags) => println!("{} - {}", tags.artist, tags.title),
//!     Err(err) => println!("partial title: {}", err.partial.title),
//! }
//! ```

mod error;
mod reader;

pub use error::{MetadataError, Result};
pub use reader::LoftyTagExtractor;
