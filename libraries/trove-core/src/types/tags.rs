/// Tag fields returned by a `TagExtractor`
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Audio file extensions the indexer considers, lowercase
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "m4a", "aac", "wma", "opus"];

/// Descriptive metadata read from a file's tags and audio properties
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TagFields {
    /// Track title
    pub title: String,
    /// Artist name
    pub artist: String,
    /// Album title
    pub album: String,
    /// Genre
    pub genre: String,
    /// Release year (0 = unknown)
    pub year: u32,
    /// Track number (0 = unknown)
    pub track: u32,
    /// Disc number (0 = unknown)
    pub disc: u32,
    /// Duration in seconds
    pub duration: u32,
    /// Bitrate in kbps
    pub bitrate: u32,
    /// MusicBrainz recording id
    pub mb_track_id: String,
    /// MusicBrainz release id
    pub mb_album_id: String,
    /// MusicBrainz artist id
    pub mb_artist_id: String,
}

/// Check if a path has a supported audio extension (case-insensitive)
pub fn is_supported_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}
