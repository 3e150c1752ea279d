//! Durable cache snapshots
//!
//! The snapshot is one JSON document holding every cached entry. Saves go to a
//! sibling temp file first and are renamed into place, so a crash mid-write
//! leaves the previous snapshot intact.

use crate::{IndexerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use trove_core::MediaItem;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// On-disk snapshot document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFile {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub entries: Vec<MediaItem>,
}

/// Load a snapshot into a path-keyed map
///
/// Never fails: a missing, unreadable, corrupt or incompatible file yields an
/// empty map, which forces a full rescan.
pub fn load_snapshot(path: &Path) -> HashMap<String, MediaItem> {
    match read_snapshot(path) {
        Ok(snapshot) => {
            let entries: HashMap<String, MediaItem> = snapshot
                .entries
                .into_iter()
                .map(|item| (item.path.clone(), item))
                .collect();
            info!(
                "Loaded {} cached entries from {} (saved {})",
                entries.len(),
                path.display(),
                snapshot.saved_at
            );
            entries
        }
        Err(IndexerError::Io(e)) if e.kind() == ErrorKind::NotFound => {
            debug!("No snapshot at {}, starting empty", path.display());
            HashMap::new()
        }
        Err(e) => {
            warn!(
                "Discarding unusable snapshot {}: {}",
                path.display(),
                e
            );
            HashMap::new()
        }
    }
}

/// Read and validate a snapshot file
pub fn read_snapshot(path: &Path) -> Result<SnapshotFile> {
    let file = File::open(path)?;
    let snapshot: SnapshotFile = serde_json::from_reader(BufReader::new(file))?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(IndexerError::SnapshotVersion(snapshot.version));
    }

    Ok(snapshot)
}

/// Atomically write every entry to `path`
///
/// Entries are written sorted by path so snapshots diff cleanly.
pub fn save_snapshot(path: &Path, entries: &HashMap<String, MediaItem>) -> Result<()> {
    let mut sorted: Vec<MediaItem> = entries.values().cloned().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let snapshot = SnapshotFile {
        version: SNAPSHOT_VERSION,
        saved_at: Utc::now(),
        entries: sorted,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    if let Err(e) = write_file(&tmp, &snapshot) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path)?;

    debug!(
        "Saved {} entries to {}",
        snapshot.entries.len(),
        path.display()
    );
    Ok(())
}

fn write_file(path: &Path, snapshot: &SnapshotFile) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, snapshot)?;
    writer.flush()?;

    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
