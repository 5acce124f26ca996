//! Build cache for incremental runs.
//!
//! Decoding, thumbnail encoding and OCR dominate the cost of a build. This
//! module records what was produced for each asset so the next run can skip
//! work whose inputs have not changed.
//!
//! # Design
//!
//! Entries are keyed by `folder/filename` and hold two independent records:
//!
//! - **Thumbnail artifact**: the source modification time at generation and
//!   the size fingerprint ([`hash_thumbnail_params`]). Consumed by
//!   [`staleness::assess`](crate::staleness::assess).
//! - **Analysis**: OCR text and sampled color, with the source modification
//!   time and the analysis fingerprint ([`hash_analysis_params`]). Reused
//!   unless the source is newer than the recorded time
//!   ([`staleness::source_changed`](crate::staleness::source_changed), the
//!   same test the thumbnail uses) or the fingerprint differs.
//!
//! Degraded results (decode or recognition failures) are never recorded, so
//! they are retried on the next run.
//!
//! ## Storage
//!
//! The cache is a JSON file at `<output_root>/.cache-manifest.json`, written
//! atomically. An unreadable or version-mismatched file loads as empty.
//!
//! ## Bypassing the cache
//!
//! `--no-cache` starts from an empty cache: every thumbnail is regenerated
//! and every asset re-analyzed.

use crate::config::GalleryConfig;
use crate::staleness;
use crate::store::{self, Store};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Name of the cache file within the output directory.
const CACHE_FILENAME: &str = ".cache-manifest.json";

/// Version of the cache format. Bump this to invalidate all existing caches
/// when the format or key computation changes.
const CACHE_VERSION: u32 = 1;

/// Generation record of one thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailArtifact {
    pub source_modified: SystemTime,
    pub fingerprint: String,
}

/// Cached OCR text and color of one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisEntry {
    pub source_modified: SystemTime,
    pub fingerprint: String,
    pub text: String,
    pub color: String,
}

impl AnalysisEntry {
    /// True if this analysis is still valid for a source modified at
    /// `source_modified` under the settings hashed into `fingerprint`.
    pub fn matching(&self, source_modified: SystemTime, fingerprint: &str) -> bool {
        !staleness::source_changed(source_modified, self.source_modified)
            && self.fingerprint == fingerprint
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<ThumbnailArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AnalysisEntry>,
}

/// On-disk cache mapping `folder/filename` to its records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildCache {
    pub version: u32,
    pub entries: BTreeMap<String, CacheEntry>,
}

impl BuildCache {
    /// Create an empty cache (used for `--no-cache` or first build).
    pub fn empty() -> Self {
        Self {
            version: CACHE_VERSION,
            entries: BTreeMap::new(),
        }
    }

    /// Load from the output directory. Returns an empty cache if the file
    /// doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(store: &impl Store, output_dir: &Path) -> Self {
        let Ok(content) = store.read(&cache_path(output_dir)) else {
            return Self::empty();
        };
        match serde_json::from_slice::<Self>(&content) {
            Ok(cache) if cache.version == CACHE_VERSION => cache,
            Ok(_) => {
                tracing::debug!("cache version changed, starting empty");
                Self::empty()
            }
            Err(e) => {
                tracing::warn!("ignoring unreadable build cache: {e}");
                Self::empty()
            }
        }
    }

    /// Save atomically to the output directory.
    pub fn save(&self, store: &impl Store, output_dir: &Path) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        store::write_atomic(store, &cache_path(output_dir), &json)
    }

    pub fn thumbnail(&self, key: &str) -> Option<&ThumbnailArtifact> {
        self.entries.get(key).and_then(|e| e.thumbnail.as_ref())
    }

    pub fn analysis(&self, key: &str) -> Option<&AnalysisEntry> {
        self.entries.get(key).and_then(|e| e.analysis.as_ref())
    }
}

/// Resolve the cache file path for an output directory.
pub fn cache_path(output_dir: &Path) -> PathBuf {
    output_dir.join(CACHE_FILENAME)
}

/// SHA-256 of the thumbnail bounds.
///
/// If the bounds change, every previously generated thumbnail is invalid
/// regardless of timestamps.
pub fn hash_thumbnail_params(max_size: [u32; 2]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"thumbnail\0");
    hasher.update(max_size[0].to_le_bytes());
    hasher.update(max_size[1].to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// SHA-256 of everything that shapes the text and color of an asset:
/// the OCR switch and recognizer identity, the color switch and sample region.
pub fn hash_analysis_params(config: &GalleryConfig, recognizer_identity: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"analysis\0");
    if config.ocr.enabled {
        hasher.update(b"\x01");
        hasher.update(recognizer_identity.as_bytes());
        hasher.update(b"\0");
    } else {
        hasher.update(b"\x00");
    }
    let sample = &config.color_sample;
    if sample.enabled {
        hasher.update(b"\x01");
        hasher.update(sample.corner.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(sample.size[0].to_le_bytes());
        hasher.update(sample.size[1].to_le_bytes());
    } else {
        hasher.update(b"\x00");
    }
    format!("{:x}", hasher.finalize())
}

/// Summary of thumbnail and analysis work for a build run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub thumbnails_fresh: u32,
    pub thumbnails_generated: u32,
    pub thumbnails_failed: u32,
    pub analyses_cached: u32,
    pub analyses_computed: u32,
}

impl CacheStats {
    pub fn total_thumbnails(&self) -> u32 {
        self.thumbnails_fresh + self.thumbnails_generated + self.thumbnails_failed
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "thumbnails: {} cached, {} generated",
            self.thumbnails_fresh, self.thumbnails_generated
        )?;
        if self.thumbnails_failed > 0 {
            write!(f, ", {} failed", self.thumbnails_failed)?;
        }
        write!(
            f,
            "; analysis: {} cached, {} computed",
            self.analyses_cached, self.analyses_computed
        )
    }
}
