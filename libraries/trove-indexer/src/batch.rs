//! Batch transfer from walkers to the cache
//!
//! A walker accumulates items in its `BatchBuffer` and flushes them as a
//! `MediaBatch`: the root plus one index-aligned sequence per field. The cache
//! validates every sequence length before reading any of them.

use crate::error::BatchError;
use crate::walker::WalkerMessage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use trove_core::MediaItem;

/// Default number of items per batch
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// One batch of items as parallel field sequences
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaBatch {
    pub root: PathBuf,
    pub paths: Vec<String>,
    pub bases: Vec<String>,
    pub titles: Vec<String>,
    pub artists: Vec<String>,
    pub albums: Vec<String>,
    pub genres: Vec<String>,
    pub years: Vec<u32>,
    pub tracks: Vec<u32>,
    pub discs: Vec<u32>,
    pub durations: Vec<u32>,
    pub bitrates: Vec<u32>,
    pub sizes: Vec<u64>,
    pub mtimes: Vec<i64>,
    pub inodes: Vec<u64>,
    pub mb_track_ids: Vec<String>,
    pub mb_album_ids: Vec<String>,
    pub mb_artist_ids: Vec<String>,
}

impl MediaBatch {
    /// Flatten items into a batch, preserving their order
    pub fn from_items(root: impl Into<PathBuf>, items: Vec<MediaItem>) -> Self {
        let mut batch = Self {
            root: root.into(),
            ..Default::default()
        };

        for item in items {
            batch.paths.push(item.path);
            batch.bases.push(item.base);
            batch.titles.push(item.title);
            batch.artists.push(item.artist);
            batch.albums.push(item.album);
            batch.genres.push(item.genre);
            batch.years.push(item.year);
            batch.tracks.push(item.track);
            batch.discs.push(item.disc);
            batch.durations.push(item.duration);
            batch.bitrates.push(item.bitrate);
            batch.sizes.push(item.size);
            batch.mtimes.push(item.mtime);
            batch.inodes.push(item.inode);
            batch.mb_track_ids.push(item.mb_track_id);
            batch.mb_album_ids.push(item.mb_album_id);
            batch.mb_artist_ids.push(item.mb_artist_id);
        }

        batch
    }

    /// Number of items, as given by the path sequence
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Check that every field sequence has one value per path
    pub fn validate(&self) -> Result<(), BatchError> {
        let expected = self.paths.len();
        let lengths = [
            ("bases", self.bases.len()),
            ("titles", self.titles.len()),
            ("artists", self.artists.len()),
            ("albums", self.albums.len()),
            ("genres", self.genres.len()),
            ("years", self.years.len()),
            ("tracks", self.tracks.len()),
            ("discs", self.discs.len()),
            ("durations", self.durations.len()),
            ("bitrates", self.bitrates.len()),
            ("sizes", self.sizes.len()),
            ("mtimes", self.mtimes.len()),
            ("inodes", self.inodes.len()),
            ("mb_track_ids", self.mb_track_ids.len()),
            ("mb_album_ids", self.mb_album_ids.len()),
            ("mb_artist_ids", self.mb_artist_ids.len()),
        ];

        for (field, actual) in lengths {
            if actual != expected {
                return Err(BatchError::LengthMismatch {
                    field,
                    expected,
                    actual,
                });
            }
        }

        Ok(())
    }

    /// Rebuild items, failing if the sequences are not aligned
    pub fn into_items(self) -> Result<Vec<MediaItem>, BatchError> {
        self.validate()?;

        let count = self.paths.len();
        let mut paths = self.paths.into_iter();
        let mut bases = self.bases.into_iter();
        let mut titles = self.titles.into_iter();
        let mut artists = self.artists.into_iter();
        let mut albums = self.albums.into_iter();
        let mut genres = self.genres.into_iter();
        let mut mb_track_ids = self.mb_track_ids.into_iter();
        let mut mb_album_ids = self.mb_album_ids.into_iter();
        let mut mb_artist_ids = self.mb_artist_ids.into_iter();

        let mut items = Vec::with_capacity(count);
        for i in 0..count {
            // Lengths were validated above, so every iterator yields here
            items.push(MediaItem {
                path: paths.next().unwrap_or_default(),
                base: bases.next().unwrap_or_default(),
                title: titles.next().unwrap_or_default(),
                artist: artists.next().unwrap_or_default(),
                album: albums.next().unwrap_or_default(),
                genre: genres.next().unwrap_or_default(),
                year: self.years[i],
                track: self.tracks[i],
                disc: self.discs[i],
                duration: self.durations[i],
                bitrate: self.bitrates[i],
                size: self.sizes[i],
                mtime: self.mtimes[i],
                inode: self.inodes[i],
                mb_track_id: mb_track_ids.next().unwrap_or_default(),
                mb_album_id: mb_album_ids.next().unwrap_or_default(),
                mb_artist_id: mb_artist_ids.next().unwrap_or_default(),
                offline: false,
            });
        }

        Ok(items)
    }
}

/// Walker-side batch accumulator
///
/// The traversal thread pushes items; `flush` drains and sends them. Both may
/// run on different threads, so the buffer sits behind its own mutex and
/// sending happens while the lock is held to keep batches in order.
#[derive(Debug)]
pub struct BatchBuffer {
    root: PathBuf,
    threshold: usize,
    items: Mutex<Vec<MediaItem>>,
    tx: mpsc::UnboundedSender<WalkerMessage>,
    batches_sent: AtomicU64,
}

impl BatchBuffer {
    pub fn new(
        root: impl Into<PathBuf>,
        threshold: usize,
        tx: mpsc::UnboundedSender<WalkerMessage>,
    ) -> Self {
        let threshold = threshold.max(1);
        Self {
            root: root.into(),
            threshold,
            items: Mutex::new(Vec::with_capacity(threshold)),
            tx,
            batches_sent: AtomicU64::new(0),
        }
    }

    /// Append an item; returns true once the buffer has reached its threshold
    pub fn push(&self, item: MediaItem) -> bool {
        let mut items = self.lock();
        items.push(item);
        items.len() >= self.threshold
    }

    /// Send everything buffered as one batch; returns the number of items sent
    pub fn flush(&self) -> usize {
        let mut items = self.lock();
        if items.is_empty() {
            return 0;
        }

        let drained = std::mem::replace(&mut *items, Vec::with_capacity(self.threshold));
        let count = drained.len();
        let batch = MediaBatch::from_items(self.root.clone(), drained);

        if self.tx.send(WalkerMessage::Batch(batch)).is_err() {
            tracing::debug!(
                "Cache closed, dropping batch of {} items from {}",
                count,
                self.root.display()
            );
            return 0;
        }

        self.batches_sent.fetch_add(1, Ordering::Relaxed);
        count
    }

    /// Items waiting to be flushed
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    pub fn batches_sent(&self) -> u64 {
        self.batches_sent.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<MediaItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(path: &str, title: &str) -> MediaItem {
        let mut item = MediaItem::new(path);
        item.title = title.to_string();
        item.size = 1000;
        item.mtime = 1_700_000_000;
        item.mb_album_id = "release-1".to_string();
        item
    }

    #[test]
    fn batch_preserves_items_and_order() {
        let items = vec![item("/m/b.mp3", "B"), item("/m/a.mp3", "A")];
        let batch = MediaBatch::from_items("/m", items.clone());

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.into_items().unwrap(), items);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let mut batch = MediaBatch::from_items("/m", vec![item("/m/a.mp3", "A")]);
        batch.mtimes.push(5);

        assert_eq!(
            batch.clone().into_items(),
            Err(BatchError::LengthMismatch {
                field: "mtimes",
                expected: 1,
                actual: 2,
            })
        );

        batch.mtimes.pop();
        batch.titles.clear();
        assert!(matches!(
            batch.validate(),
            Err(BatchError::LengthMismatch { field: "titles", .. })
        ));
    }

    #[test]
    fn items_from_batch_are_online() {
        let mut offline = item("/m/a.mp3", "A");
        offline.offline = true;

        let items = MediaBatch::from_items("/m", vec![offline]).into_items().unwrap();
        assert!(!items[0].offline);
    }

    #[test]
    fn buffer_reports_threshold_and_flushes_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let buffer = BatchBuffer::new("/m", 2, tx);

        assert!(!buffer.push(item("/m/1.mp3", "1")));
        assert!(buffer.push(item("/m/2.mp3", "2")));
        assert_eq!(buffer.flush(), 2);
        assert_eq!(buffer.pending(), 0);

        buffer.push(item("/m/3.mp3", "3"));
        assert_eq!(buffer.flush(), 1);
        assert_eq!(buffer.flush(), 0);
        assert_eq!(buffer.batches_sent(), 2);

        let mut titles = Vec::new();
        while let Ok(WalkerMessage::Batch(batch)) = rx.try_recv() {
            titles.extend(batch.titles);
        }
        assert_eq!(titles, vec!["1", "2", "3"]);
    }

    #[test]
    fn flush_after_cache_closed_drops_quietly() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let buffer = BatchBuffer::new("/m", 10, tx);

        buffer.push(item("/m/1.mp3", "1"));
        assert_eq!(buffer.flush(), 0);
        assert_eq!(buffer.batches_sent(), 0);
    }
}
