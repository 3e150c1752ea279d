//! Root directory lists
//!
//! Roots are kept in a plain text file, one absolute path per line. Blank lines
//! and lines starting with `#` are ignored.

use crate::Result;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use trove_core::DirectorySource;

/// Editable, ordered list of roots backed by a text file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryList {
    roots: Vec<PathBuf>,
}

impl DirectoryList {
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut list = Self::default();
        for root in roots {
            list.add(root);
        }
        list
    }

    /// Parse a directory file; a missing file is an empty list
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Self::parse(&contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No directory file at {}", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn parse(contents: &str) -> Self {
        Self::new(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(PathBuf::from),
        )
    }

    /// Append a root; returns false if it was already present
    pub fn add(&mut self, root: impl Into<PathBuf>) -> bool {
        let root = root.into();
        if self.roots.contains(&root) {
            return false;
        }
        self.roots.push(root);
        true
    }

    /// Remove a root; returns false if it was not present
    pub fn remove(&mut self, root: &Path) -> bool {
        let before = self.roots.len();
        self.roots.retain(|r| r != root);
        self.roots.len() != before
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Write the list back, replacing the file atomically
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut contents = String::from("# Trove library roots, one per line\n");
        for root in &self.roots {
            contents.push_str(&root.to_string_lossy());
            contents.push('\n');
        }

        let tmp = path.with_extension("tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl DirectorySource for DirectoryList {
    fn roots(&self) -> Vec<PathBuf> {
        self.roots.clone()
    }
}

/// Directory source that re-reads its file on every scan
///
/// Edits made between scans take effect on the next `start_scan`.
#[derive(Debug, Clone)]
pub struct DirectoryFile {
    path: PathBuf,
}

impl DirectoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DirectorySource for DirectoryFile {
    fn roots(&self) -> Vec<PathBuf> {
        match DirectoryList::load(&self.path) {
            Ok(list) => list.roots,
            Err(e) => {
                warn!(
                    "Failed to read directory file {}: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parse_skips_comments_blanks_and_duplicates() {
        let list = DirectoryList::parse(
            "# music\n/music\n\n   /mnt/usb  \n#/old\n/music\n",
        );

        assert_eq!(
            list.roots(),
            &[PathBuf::from("/music"), PathBuf::from("/mnt/usb")]
        );
    }

    #[test]
    fn missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let list = DirectoryList::load(&temp.path().join("dirs.txt")).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn add_remove_save_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("conf").join("dirs.txt");

        let mut list = DirectoryList::default();
        assert!(list.add("/music"));
        assert!(!list.add("/music"));
        assert!(list.add("/podcasts"));
        assert!(list.remove(Path::new("/music")));
        assert!(!list.remove(Path::new("/nowhere")));
        list.save(&path).unwrap();

        assert_eq!(DirectoryList::load(&path).unwrap(), list);
    }

    #[test]
    fn directory_file_sees_later_edits() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dirs.txt");
        let source = DirectoryFile::new(&path);

        assert!(DirectorySource::roots(&source).is_empty());

        fs::write(&path, "/a\n/b\n").unwrap();
        assert_eq!(
            DirectorySource::roots(&source),
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
    }
}
