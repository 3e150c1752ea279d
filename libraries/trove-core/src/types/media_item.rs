/// Media item domain type
use crate::types::TagFields;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Staleness fingerprint of a file on disk.
///
/// Two observations of the same path with equal fingerprints are treated as the
/// same content; no other field participates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    /// File size in bytes
    pub size: u64,
    /// Modification time, seconds since the Unix epoch
    pub mtime: i64,
}

impl Fingerprint {
    /// Create a fingerprint from size and mtime
    pub fn new(size: u64, mtime: i64) -> Self {
        Self { size, mtime }
    }

    /// Read the fingerprint from filesystem metadata
    pub fn from_metadata(meta: &std::fs::Metadata) -> Self {
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        Self {
            size: meta.len(),
            mtime,
        }
    }
}

/// One audio file's known state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaItem {
    /// Absolute file path (unique key)
    pub path: String,

    /// Containing directory
    pub base: String,

    /// Track title
    #[serde(default)]
    pub title: String,

    /// Artist name
    #[serde(default)]
    pub artist: String,

    /// Album title
    #[serde(default)]
    pub album: String,

    /// Genre
    #[serde(default)]
    pub genre: String,

    /// Release year (0 = unknown)
    #[serde(default)]
    pub year: u32,

    /// Track number (0 = unknown)
    #[serde(default)]
    pub track: u32,

    /// Disc number (0 = unknown)
    #[serde(default)]
    pub disc: u32,

    /// Duration in seconds
    #[serde(default)]
    pub duration: u32,

    /// Bitrate in kbps
    #[serde(default)]
    pub bitrate: u32,

    /// File size in bytes
    pub size: u64,

    /// Modification time, seconds since the Unix epoch
    pub mtime: i64,

    /// Inode / file id (0 where the platform has none)
    #[serde(default)]
    pub inode: u64,

    /// MusicBrainz recording id
    #[serde(default)]
    pub mb_track_id: String,

    /// MusicBrainz release id
    #[serde(default)]
    pub mb_album_id: String,

    /// MusicBrainz artist id
    #[serde(default)]
    pub mb_artist_id: String,

    /// Set when the item's root is not currently configured
    #[serde(default)]
    pub offline: bool,
}

impl MediaItem {
    /// Create an item with only its path (and derived base) filled in
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let base = Path::new(&path)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            path,
            base,
            ..Default::default()
        }
    }

    /// Current staleness fingerprint
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(self.size, self.mtime)
    }

    /// Record a fresh fingerprint
    pub fn set_fingerprint(&mut self, fingerprint: Fingerprint) {
        self.size = fingerprint.size;
        self.mtime = fingerprint.mtime;
    }

    /// Copy descriptive tag fields onto this item
    pub fn apply_tags(&mut self, tags: TagFields) {
        self.title = tags.title;
        self.artist = tags.artist;
        self.album = tags.album;
        self.genre = tags.genre;
        self.year = tags.year;
        self.track = tags.track;
        self.disc = tags.disc;
        self.duration = tags.duration;
        self.bitrate = tags.bitrate;
        self.mb_track_id = tags.mb_track_id;
        self.mb_album_id = tags.mb_album_id;
        self.mb_artist_id = tags.mb_artist_id;
    }

    /// File name component of the path
    pub fn file_name(&self) -> &str {
        Path::new(&self.path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.path)
    }

    /// Whether this item lives under `root`
    pub fn is_under(&self, root: &Path) -> bool {
        Path::new(&self.path).starts_with(root)
    }
}
