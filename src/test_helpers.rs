//! Shared test utilities for the card-gallery test suite.
//!
//! Provides an in-memory [`Store`] with a logical clock, a recording
//! [`TextRecognizer`], and synthetic image encoders.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_helpers::*;
//!
//! let store = MemoryStore::new();
//! store.add_file("/src/A/1.png", png_bytes(40, 60, [200, 10, 10]), 100);
//! let folders = scan(&store, &config_for("/src", "/out")).unwrap();
//! ```

use crate::config::GalleryConfig;
use crate::ocr::{RecognitionError, TextRecognizer};
use crate::store::{Entry, EntryKind, Store};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::collections::{BTreeMap, HashSet};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// =========================================================================
// In-memory store
// =========================================================================

/// Writes made through the store are stamped from this point onwards, one
/// second apart, so they always sort after hand-set source times.
const CLOCK_START_SECS: u64 = 2_000_000_000;

#[derive(Debug, Clone)]
struct MemFile {
    bytes: Vec<u8>,
    modified: SystemTime,
}

/// In-memory [`Store`] with deterministic modification times.
#[derive(Debug)]
pub struct MemoryStore {
    files: Mutex<BTreeMap<PathBuf, MemFile>>,
    dirs: Mutex<HashSet<PathBuf>>,
    failing_renames: Mutex<HashSet<PathBuf>>,
    clock: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(BTreeMap::new()),
            dirs: Mutex::new(HashSet::new()),
            failing_renames: Mutex::new(HashSet::new()),
            clock: AtomicU64::new(CLOCK_START_SECS),
        }
    }

    /// Add a source file with an explicit modification time (seconds).
    pub fn add_file(&self, path: impl AsRef<Path>, bytes: Vec<u8>, modified_secs: u64) {
        self.files.lock().unwrap().insert(
            path.as_ref().to_path_buf(),
            MemFile {
                bytes,
                modified: secs(modified_secs),
            },
        );
    }

    /// Create an empty directory.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        self.dirs.lock().unwrap().insert(path.as_ref().to_path_buf());
    }

    /// Set a file's modification time. Panics if the file is missing.
    pub fn touch(&self, path: impl AsRef<Path>, modified_secs: u64) {
        let mut files = self.files.lock().unwrap();
        let file = files
            .get_mut(path.as_ref())
            .unwrap_or_else(|| panic!("touch: {} not found", path.as_ref().display()));
        file.modified = secs(modified_secs);
    }

    /// Make every rename onto `target` fail.
    pub fn fail_renames_to(&self, target: impl AsRef<Path>) {
        self.failing_renames
            .lock()
            .unwrap()
            .insert(target.as_ref().to_path_buf());
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.files.lock().unwrap().contains_key(path.as_ref())
    }

    pub fn read_string(&self, path: impl AsRef<Path>) -> String {
        let bytes = self.read(path.as_ref()).unwrap();
        String::from_utf8(bytes).unwrap()
    }

    pub fn modified_of(&self, path: impl AsRef<Path>) -> SystemTime {
        self.modified(path.as_ref())
            .unwrap()
            .unwrap_or_else(|| panic!("{} not found", path.as_ref().display()))
    }

    /// All file paths under `prefix`, sorted.
    pub fn paths_under(&self, prefix: impl AsRef<Path>) -> Vec<PathBuf> {
        self.files
            .lock()
            .unwrap()
            .keys()
            .filter(|p| p.starts_with(prefix.as_ref()))
            .cloned()
            .collect()
    }

    fn tick(&self) -> SystemTime {
        secs(self.clock.fetch_add(1, Ordering::SeqCst))
    }
}

fn secs(s: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(s)
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, path.display().to_string())
}

impl Store for MemoryStore {
    fn is_dir(&self, path: &Path) -> bool {
        if self.dirs.lock().unwrap().contains(path) {
            return true;
        }
        self.files
            .lock()
            .unwrap()
            .keys()
            .any(|p| p != path && p.starts_with(path))
    }

    fn modified(&self, path: &Path) -> io::Result<Option<SystemTime>> {
        Ok(self.files.lock().unwrap().get(path).map(|f| f.modified))
    }

    fn list_dir(&self, path: &Path) -> io::Result<Vec<Entry>> {
        if !self.is_dir(path) {
            return Err(not_found(path));
        }
        let mut children: BTreeMap<String, EntryKind> = BTreeMap::new();
        let files = self.files.lock().unwrap();
        let dirs = self.dirs.lock().unwrap();
        let file_paths = files.keys().map(|p| (p, false));
        let dir_paths = dirs.iter().map(|p| (p, true));
        for (p, is_dir) in file_paths.chain(dir_paths) {
            let Ok(rest) = p.strip_prefix(path) else {
                continue;
            };
            let mut components = rest.components();
            let Some(first) = components.next() else {
                continue;
            };
            let name = first.as_os_str().to_string_lossy().into_owned();
            let kind = if components.next().is_some() || is_dir {
                EntryKind::Dir
            } else {
                EntryKind::File
            };
            children.insert(name, kind);
        }
        Ok(children
            .into_iter()
            .map(|(name, kind)| Entry {
                path: path.join(&name),
                name,
                kind,
            })
            .collect())
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .map(|f| f.bytes.clone())
            .ok_or_else(|| not_found(path))
    }

    fn write(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let modified = self.tick();
        self.files.lock().unwrap().insert(
            path.to_path_buf(),
            MemFile {
                bytes: bytes.to_vec(),
                modified,
            },
        );
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if self.failing_renames.lock().unwrap().contains(to) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("rename onto {} refused", to.display()),
            ));
        }
        let mut files = self.files.lock().unwrap();
        let file = files.remove(from).ok_or_else(|| not_found(from))?;
        files.insert(to.to_path_buf(), file);
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.files
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| not_found(path))
    }
}

// =========================================================================
// Recognizer double
// =========================================================================

/// Recognizer that returns canned text and records each call's image size.
#[derive(Debug)]
pub struct MockRecognizer {
    text: Option<String>,
    calls: Mutex<Vec<(u32, u32)>>,
}

impl MockRecognizer {
    pub fn returning(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A recognizer whose every call fails.
    pub fn failing() -> Self {
        Self {
            text: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(u32, u32)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl TextRecognizer for MockRecognizer {
    fn recognize(&self, image: &DynamicImage) -> Result<String, RecognitionError> {
        self.calls
            .lock()
            .unwrap()
            .push((image.width(), image.height()));
        self.text
            .clone()
            .ok_or_else(|| RecognitionError::Failed("mock failure".into()))
    }

    fn identity(&self) -> String {
        "mock".into()
    }
}

// =========================================================================
// Synthetic images and configs
// =========================================================================

/// PNG of the given size filled with one color.
pub fn png_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)
}

/// PNG filled with `body`, except a `corner_size` square in the top-right
/// corner filled with `corner`.
pub fn card_png(width: u32, height: u32, body: [u8; 3], corner: [u8; 3], corner_size: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        if x >= width.saturating_sub(corner_size) && y < corner_size {
            Rgb(corner)
        } else {
            Rgb(body)
        }
    });
    encode(DynamicImage::ImageRgb8(img), ImageFormat::Png)
}

/// Baseline JPEG carrying an EXIF orientation tag (1-8).
pub fn jpeg_with_orientation(width: u32, height: u32, orientation: u8) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([90, 90, 90]));
    let jpeg = encode(DynamicImage::ImageRgb8(img), ImageFormat::Jpeg);

    // APP1 "Exif" segment holding a big-endian TIFF with one IFD0 entry.
    let mut app1: Vec<u8> = vec![0xFF, 0xE1, 0x00, 0x22];
    app1.extend_from_slice(b"Exif\0\0");
    app1.extend_from_slice(&[b'M', b'M', 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08]);
    app1.extend_from_slice(&[0x00, 0x01]);
    app1.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
    app1.extend_from_slice(&[0x00, orientation, 0x00, 0x00]);
    app1.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

    let mut out = Vec::with_capacity(jpeg.len() + app1.len());
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&app1);
    out.extend_from_slice(&jpeg[2..]);
    out
}

pub fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

/// Default config pointed at the given roots.
pub fn config_for(source: &str, output: &str) -> GalleryConfig {
    GalleryConfig {
        source_root: PathBuf::from(source),
        output_root: PathBuf::from(output),
        ..GalleryConfig::default()
    }
}
