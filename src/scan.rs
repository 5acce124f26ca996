//! Source tree scanning.
//!
//! First stage of the build. Discovers card folders and their images:
//!
//! ```text
//! CardImages/                 # source root
//! ├── Alpha/                  # folder
//! │   ├── Black Lotus.png     # asset
//! │   ├── Mox Pearl.JPG       # extensions match case-insensitively
//! │   ├── notes.txt           # not on the allow-list, ignored
//! │   └── thumbnails/         # derived directory, never scanned
//! └── Beta/
//!     └── Shivan Dragon.jpeg
//! ```
//!
//! Only immediate files of immediate sub-directories are considered. Hidden
//! entries (leading `.`) are skipped, which also keeps half-written temporary
//! files out of the scan. Folders without any matching image are omitted.
//!
//! Scanning is read-only. A missing source root is fatal for the whole run.

use crate::config::GalleryConfig;
use crate::store::{EntryKind, Store};
use crate::types::{Folder, ImageAsset, THUMBNAILS_DIR};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Source folder not found: {0}")]
    SourceTreeMissing(PathBuf),
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Modification time unavailable for {0}")]
    NoModifiedTime(PathBuf),
}

/// Scan the configured source root.
///
/// Returns folders sorted by name, each with its assets sorted by filename.
pub fn scan(store: &impl Store, config: &GalleryConfig) -> Result<Vec<Folder>, ScanError> {
    let root = &config.source_root;
    if !store.is_dir(root) {
        return Err(ScanError::SourceTreeMissing(root.clone()));
    }

    let mut folders = Vec::new();
    for entry in list(store, root)? {
        if entry.kind != EntryKind::Dir
            || is_hidden(&entry.name)
            || entry.name == THUMBNAILS_DIR
        {
            continue;
        }
        let assets = scan_folder(store, config, &entry.name, &entry.path)?;
        if !assets.is_empty() {
            folders.push(Folder {
                name: entry.name,
                assets,
            });
        }
    }

    folders.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(folders)
}

fn scan_folder(
    store: &impl Store,
    config: &GalleryConfig,
    folder: &str,
    path: &Path,
) -> Result<Vec<ImageAsset>, ScanError> {
    let mut assets = Vec::new();
    for entry in list(store, path)? {
        if entry.kind != EntryKind::File
            || is_hidden(&entry.name)
            || !config.is_allowed_image(&entry.path)
        {
            continue;
        }
        let modified = store
            .modified(&entry.path)
            .map_err(|source| ScanError::Io {
                path: entry.path.clone(),
                source,
            })?
            .ok_or_else(|| ScanError::NoModifiedTime(entry.path.clone()))?;
        assets.push(ImageAsset {
            folder: folder.to_string(),
            filename: entry.name,
            source_path: entry.path,
            modified,
        });
    }
    assets.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(assets)
}

fn list(store: &impl Store, path: &Path) -> Result<Vec<crate::store::Entry>, ScanError> {
    store.list_dir(path).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Total number of assets across folders.
pub fn asset_count(folders: &[Folder]) -> usize {
    folders.iter().map(|f| f.assets.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FsStore;
    use crate::test_helpers::*;
    use std::fs;
    use tempfile::TempDir;

    fn names(folders: &[Folder]) -> Vec<(String, Vec<String>)> {
        folders
            .iter()
            .map(|f| {
                (
                    f.name.clone(),
                    f.assets.iter().map(|a| a.filename.clone()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn missing_root_is_fatal() {
        let store = MemoryStore::new();
        let result = scan(&store, &config_for("/nope", "/out"));
        assert!(matches!(result, Err(ScanError::SourceTreeMissing(p)) if p == Path::new("/nope")));
    }

    #[test]
    fn scans_folders_and_filters_extensions() {
        let store = MemoryStore::new();
        store.add_file("/src/B/3.png", vec![], 1);
        store.add_file("/src/A/2.png", vec![], 1);
        store.add_file("/src/A/1.PNG", vec![], 1);
        store.add_file("/src/A/notes.txt", vec![], 1);
        store.add_file("/src/A/card.gif", vec![], 1);

        let folders = scan(&store, &config_for("/src", "/out")).unwrap();
        assert_eq!(
            names(&folders),
            vec![
                ("A".to_string(), vec!["1.PNG".to_string(), "2.png".to_string()]),
                ("B".to_string(), vec!["3.png".to_string()]),
            ]
        );
        assert_eq!(asset_count(&folders), 3);
    }

    #[test]
    fn skips_thumbnail_dirs_hidden_files_and_root_files() {
        let store = MemoryStore::new();
        store.add_file("/src/cover.png", vec![], 1);
        store.add_file("/src/A/1.png", vec![], 1);
        store.add_file("/src/A/thumbnails/1.png", vec![], 1);
        store.add_file("/src/A/.1.png.tmp", vec![], 1);
        store.add_file("/src/A/.hidden.png", vec![], 1);
        store.add_file("/src/.git/x.png", vec![], 1);

        let folders = scan(&store, &config_for("/src", "/out")).unwrap();
        assert_eq!(
            names(&folders),
            vec![("A".to_string(), vec!["1.png".to_string()])]
        );
    }

    #[test]
    fn top_level_thumbnails_dir_is_not_a_folder() {
        let store = MemoryStore::new();
        store.add_file("/src/thumbnails/1.png", vec![], 1);
        store.add_file("/src/A/thumbnails-back.png", vec![], 1);

        let folders = scan(&store, &config_for("/src", "/out")).unwrap();
        assert_eq!(
            names(&folders),
            vec![("A".to_string(), vec!["thumbnails-back.png".to_string()])]
        );
    }

    #[test]
    fn empty_folders_are_omitted() {
        let store = MemoryStore::new();
        store.add_dir("/src/Empty");
        store.add_file("/src/Docs/readme.md", vec![], 1);
        store.add_file("/src/A/1.jpg", vec![], 1);

        let folders = scan(&store, &config_for("/src", "/out")).unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].name, "A");
    }

    #[test]
    fn records_source_modified_time() {
        let store = MemoryStore::new();
        store.add_file("/src/A/1.png", vec![], 42);
        let folders = scan(&store, &config_for("/src", "/out")).unwrap();
        let asset = &folders[0].assets[0];
        assert_eq!(asset.modified, store.modified_of("/src/A/1.png"));
        assert_eq!(asset.source_path, PathBuf::from("/src/A/1.png"));
    }

    #[test]
    fn scans_real_directory() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("A/thumbnails")).unwrap();
        fs::write(tmp.path().join("A/1.png"), "x").unwrap();
        fs::write(tmp.path().join("A/thumbnails/1.png"), "x").unwrap();

        let mut config = GalleryConfig::default();
        config.source_root = tmp.path().to_path_buf();
        let folders = scan(&FsStore::new(), &config).unwrap();
        assert_eq!(
            names(&folders),
            vec![("A".to_string(), vec!["1.png".to_string()])]
        );
    }
}
