//! Storage abstraction over the source and output trees.
//!
//! The pipeline never touches `std::fs` directly. Every read, write, stat and
//! listing goes through a [`Store`], so the scanning, staleness and manifest
//! logic can be exercised against an in-memory tree in unit tests.
//!
//! [`FsStore`] is the production implementation. Directory listings use
//! `walkdir` with a fixed depth of one and are sorted by file name.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Kind of a listed directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub path: PathBuf,
    pub kind: EntryKind,
}

/// File-system operations used by the pipeline.
///
/// Implementations must be `Sync`: workers on the processing pool share one
/// store and each writes only the paths derived from its own asset.
pub trait Store: Sync {
    /// True if `path` exists and is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Modification time of a file, or `None` if it does not exist.
    fn modified(&self, path: &Path) -> io::Result<Option<SystemTime>>;

    /// Immediate children of a directory, sorted by name.
    fn list_dir(&self, path: &Path) -> io::Result<Vec<Entry>>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Write a file, creating parent directories as needed.
    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// Temporary sibling used by [`write_atomic`].
pub fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

/// Write `bytes` to a temporary sibling of `path` and rename it into place.
///
/// Readers observe either the previous file or the complete new one. If the
/// rename fails the temporary file is removed and the target is untouched.
pub fn write_atomic(store: &impl Store, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = temp_path_for(path);
    store.write(&tmp, bytes)?;
    store.rename(&tmp, path).inspect_err(|_| {
        let _ = store.remove(&tmp);
    })
}

/// Store backed by the local file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStore;

impl FsStore {
    pub fn new() -> Self {
        Self
    }
}

impl Store for FsStore {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn modified(&self, path: &Path) -> io::Result<Option<SystemTime>> {
        match std::fs::metadata(path) {
            Ok(meta) => meta.modified().map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<Entry>> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(io::Error::from)?;
            let kind = if entry.file_type().is_dir() {
                EntryKind::Dir
            } else if entry.file_type().is_file() {
                EntryKind::File
            } else {
                // Follow symlinks so linked card folders still scan.
                match std::fs::metadata(entry.path()) {
                    Ok(meta) if meta.is_dir() => EntryKind::Dir,
                    Ok(meta) if meta.is_file() => EntryKind::File,
                    _ => continue,
                }
            };
            entries.push(Entry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.path().to_path_buf(),
                kind,
            });
        }
        Ok(entries)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, bytes)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MemoryStore;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn temp_path_is_hidden_sibling() {
        assert_eq!(
            temp_path_for(Path::new("/out/cards.json")),
            PathBuf::from("/out/.cards.json.tmp")
        );
    }

    #[test]
    fn fs_store_modified_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = FsStore::new();
        assert_eq!(store.modified(&tmp.path().join("nope")).unwrap(), None);
    }

    #[test]
    fn fs_store_write_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let store = FsStore::new();
        let path = tmp.path().join("a/b/c.txt");
        store.write(&path, b"hi").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hi");
        assert!(store.modified(&path).unwrap().is_some());
    }

    #[test]
    fn fs_store_lists_sorted_with_kinds() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("b_dir")).unwrap();
        fs::write(tmp.path().join("c.png"), "").unwrap();
        fs::write(tmp.path().join("a.png"), "").unwrap();
        fs::write(tmp.path().join("b_dir/nested.png"), "").unwrap();

        let entries = FsStore::new().list_dir(tmp.path()).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b_dir", "c.png"]);
        assert_eq!(entries[1].kind, EntryKind::Dir);
        assert_eq!(entries[0].kind, EntryKind::File);
    }

    #[test]
    fn write_atomic_replaces_and_leaves_no_temp() {
        let tmp = TempDir::new().unwrap();
        let store = FsStore::new();
        let path = tmp.path().join("cards.json");
        fs::write(&path, "old").unwrap();

        write_atomic(&store, &path, b"new").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn write_atomic_failed_rename_keeps_target() {
        let store = MemoryStore::new();
        let path = Path::new("/out/cards.json");
        store.write(path, b"old").unwrap();
        store.fail_renames_to(path);

        assert!(write_atomic(&store, path, b"new").is_err());
        assert_eq!(store.read(path).unwrap(), b"old");
        assert_eq!(store.modified(&temp_path_for(path)).unwrap(), None);
    }
}
