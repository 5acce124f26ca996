//! Shared types passed between pipeline stages.
//!
//! [`ManifestRecord`] is also the on-disk schema of `cards.json`; its field
//! order is the serialized key order.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

/// Sub-directory of the output root mirroring the source folders.
pub const CARD_IMAGES_DIR: &str = "CardImages";

/// Derived sub-directory holding thumbnails inside each output folder.
pub const THUMBNAILS_DIR: &str = "thumbnails";

/// Manifest file name inside the output root.
pub const MANIFEST_FILENAME: &str = "cards.json";

/// One source image, identified by `(folder, filename)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAsset {
    pub folder: String,
    pub filename: String,
    pub source_path: PathBuf,
    pub modified: SystemTime,
}

impl ImageAsset {
    /// `folder/filename`, the key used in the build cache.
    pub fn key(&self) -> String {
        format!("{}/{}", self.folder, self.filename)
    }

    /// URL of the full-size image relative to the output root.
    pub fn url(&self) -> String {
        format!("{CARD_IMAGES_DIR}/{}/{}", self.folder, self.filename)
    }

    /// URL of the thumbnail relative to the output root.
    pub fn thumb_url(&self) -> String {
        format!(
            "{CARD_IMAGES_DIR}/{}/{THUMBNAILS_DIR}/{}",
            self.folder, self.filename
        )
    }
}

/// A source folder with its images, sorted by filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub name: String,
    pub assets: Vec<ImageAsset>,
}

/// Per-asset entry of the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
    pub folder: String,
    pub filename: String,
    /// OCR text collapsed to a single line; empty when unavailable.
    pub text: String,
    /// `#rrggbb` sampled from the configured corner.
    pub color: String,
    pub url: String,
    pub thumb_url: String,
}
