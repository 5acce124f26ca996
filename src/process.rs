//! The incremental build pipeline.
//!
//! Takes the folders found by [`scan`](crate::scan) and, for every asset:
//!
//! ```text
//! Scanned ─► staleness check ─┬─► Fresh          (thumbnail reused)
//!                             ├─► Regenerated    (decode, orient, fit, encode)
//!                             └─► Failed         (prior thumbnail untouched)
//!         ─► text + color     ──► cached, computed, or degraded
//!         ─► full-size copy   ──► only when the source is newer
//!         ─► ManifestRecord
//! ```
//!
//! then assembles and atomically writes `cards.json`.
//!
//! ## Output Structure
//!
//! ```text
//! docs/
//! ├── cards.json                 # Manifest, one record per asset
//! ├── .cache-manifest.json       # Build cache
//! └── CardImages/
//!     └── Alpha/
//!         ├── Black Lotus.png    # Full-size copy
//!         └── thumbnails/
//!             └── Black Lotus.png
//! ```
//!
//! ## Failure isolation
//!
//! A file that cannot be decoded, recognized, or written only degrades its
//! own record (empty text, `#000000`, thumbnail URL falling back to the
//! full-size URL) and is logged. Only structural failures abort the run: a
//! missing source root, an unwritable cache or manifest, or cancellation.
//!
//! ## Parallel Processing
//!
//! Folders are processed in order; the assets of a folder are processed in
//! parallel on a dedicated [rayon](https://docs.rs/rayon) pool bounded by
//! `processing.max_processes`. Each asset is decoded at most once and the
//! image is shared by the thumbnail, OCR and color stages. Every worker only
//! writes paths derived from its own asset, and the manifest order is
//! established after the parallel phase, so scheduling never affects output.
//!
//! ## Source tree
//!
//! The source tree is never written. When it lives at
//! `<output_root>/CardImages` the full-size "copy" path is the source file
//! itself: copying is skipped and pruning leaves such paths alone.

use crate::cache::{
    self, AnalysisEntry, BuildCache, CacheEntry, CacheStats, ThumbnailArtifact,
};
use crate::config::{self, GalleryConfig};
use crate::imaging::{self, FALLBACK_COLOR};
use crate::manifest::{self, ManifestError};
use crate::ocr::{TextRecognizer, normalize_text};
use crate::scan::{self, ScanError};
use crate::staleness::{self, StaleReason, Staleness};
use crate::store::{self, Store};
use crate::types::{CARD_IMAGES_DIR, Folder, ImageAsset, ManifestRecord, THUMBNAILS_DIR};
use image::DynamicImage;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("Failed to save build cache {path}: {source}")]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Build cancelled")]
    Cancelled,
}

/// Run-level cancellation flag shared with the Ctrl-C handler.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct BuildOptions {
    /// Reuse thumbnails and analyses from the build cache.
    pub use_cache: bool,
    pub cancel: CancelToken,
    /// Progress events, one per folder and one per asset.
    pub events: Option<Sender<ProcessEvent>>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            cancel: CancelToken::new(),
            events: None,
        }
    }
}

/// What happened to an asset's thumbnail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailStatus {
    Fresh,
    Regenerated(StaleReason),
    Failed,
}

/// Where an asset's text and color came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStatus {
    Cached,
    Computed,
    /// Decode, recognition or sampling failed; fallback values were used.
    Degraded,
    /// Both OCR and color sampling are switched off.
    Disabled,
}

/// Progress events sent during processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    FolderStarted {
        name: String,
        asset_count: usize,
    },
    AssetProcessed {
        /// 1-based position within the folder.
        index: usize,
        folder: String,
        filename: String,
        thumbnail: ThumbnailStatus,
        analysis: AnalysisStatus,
        /// A full-size copy was written.
        copied: bool,
    },
}

#[derive(Debug)]
pub struct BuildResult {
    pub records: Vec<ManifestRecord>,
    pub manifest_path: PathBuf,
    pub folder_count: usize,
    pub cache_stats: CacheStats,
    /// Assets from the previous build whose outputs were removed.
    pub pruned: usize,
}

/// Scan the source root and run the whole pipeline.
pub fn build(
    store: &impl Store,
    config: &GalleryConfig,
    recognizer: &dyn TextRecognizer,
    options: BuildOptions,
) -> Result<BuildResult, BuildError> {
    let folders = scan::scan(store, config)?;
    process_folders(store, config, recognizer, &folders, options)
}

/// Output paths of one asset.
struct AssetPaths {
    copy: PathBuf,
    thumbnail: PathBuf,
}

fn asset_paths(output_root: &Path, folder: &str, filename: &str) -> AssetPaths {
    let dir = output_root.join(CARD_IMAGES_DIR).join(folder);
    AssetPaths {
        copy: dir.join(filename),
        thumbnail: dir.join(THUMBNAILS_DIR).join(filename),
    }
}

/// Shared, read-only state of one run.
struct Context<'a, S: Store> {
    store: &'a S,
    config: &'a GalleryConfig,
    recognizer: &'a dyn TextRecognizer,
    cache: Option<&'a BuildCache>,
    thumbnail_fingerprint: String,
    analysis_fingerprint: String,
}

struct AssetOutcome {
    key: String,
    record: ManifestRecord,
    thumbnail: ThumbnailStatus,
    analysis: AnalysisStatus,
    copied: bool,
    entry: CacheEntry,
}

/// Run the pipeline over already scanned folders.
pub fn process_folders(
    store: &impl Store,
    config: &GalleryConfig,
    recognizer: &dyn TextRecognizer,
    folders: &[Folder],
    options: BuildOptions,
) -> Result<BuildResult, BuildError> {
    let output_root = &config.output_root;
    let previous = BuildCache::load(store, output_root);
    let ctx = Context {
        store,
        config,
        recognizer,
        cache: options.use_cache.then_some(&previous),
        thumbnail_fingerprint: cache::hash_thumbnail_params(config.thumbnails.max_size),
        analysis_fingerprint: cache::hash_analysis_params(config, &recognizer.identity()),
    };

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config::effective_threads(&config.processing))
        .build()?;

    let mut outcomes: Vec<AssetOutcome> = Vec::new();
    for folder in folders {
        if options.cancel.is_cancelled() {
            break;
        }
        send(
            &options.events,
            ProcessEvent::FolderStarted {
                name: folder.name.clone(),
                asset_count: folder.assets.len(),
            },
        );
        let folder_outcomes: Vec<AssetOutcome> = pool.install(|| {
            folder
                .assets
                .par_iter()
                .enumerate()
                .filter_map(|(i, asset)| {
                    if options.cancel.is_cancelled() {
                        return None;
                    }
                    let outcome = process_asset(&ctx, asset);
                    send(
                        &options.events,
                        ProcessEvent::AssetProcessed {
                            index: i + 1,
                            folder: asset.folder.clone(),
                            filename: asset.filename.clone(),
                            thumbnail: outcome.thumbnail,
                            analysis: outcome.analysis,
                            copied: outcome.copied,
                        },
                    );
                    Some(outcome)
                })
                .collect()
        });
        outcomes.extend(folder_outcomes);
    }

    let cancelled = options.cancel.is_cancelled();
    let cache_stats = tally(&outcomes);

    let mut next = BuildCache::empty();
    if cancelled {
        // Keep records of assets this run never reached.
        next.entries = previous.entries.clone();
    }
    let mut records = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        next.entries.insert(outcome.key, outcome.entry);
        records.push(outcome.record);
    }

    let pruned = if cancelled {
        0
    } else {
        prune_orphans(store, config, &previous, folders)
    };

    next.save(store, output_root)
        .map_err(|source| BuildError::Cache {
            path: cache::cache_path(output_root),
            source,
        })?;

    if cancelled {
        return Err(BuildError::Cancelled);
    }

    let records = manifest::assemble(records)?;
    let manifest_path = manifest::write_manifest(store, output_root, &records)?;

    Ok(BuildResult {
        records,
        manifest_path,
        folder_count: folders.len(),
        cache_stats,
        pruned,
    })
}

fn send(events: &Option<Sender<ProcessEvent>>, event: ProcessEvent) {
    if let Some(tx) = events {
        // The receiver going away only means nobody is listening.
        tx.send(event).ok();
    }
}

fn process_asset<S: Store>(ctx: &Context<'_, S>, asset: &ImageAsset) -> AssetOutcome {
    let key = asset.key();
    let paths = asset_paths(&ctx.config.output_root, &asset.folder, &asset.filename);

    let previous_artifact = ctx.cache.and_then(|c| c.thumbnail(&key));
    let thumbnail_on_disk = matches!(ctx.store.modified(&paths.thumbnail), Ok(Some(_)));
    let staleness = staleness::assess(
        asset.modified,
        previous_artifact,
        thumbnail_on_disk,
        &ctx.thumbnail_fingerprint,
    );

    let analysis_enabled = ctx.config.ocr.enabled || ctx.config.color_sample.enabled;
    let cached_analysis = ctx
        .cache
        .and_then(|c| c.analysis(&key))
        .filter(|a| a.matching(asset.modified, &ctx.analysis_fingerprint));
    let needs_analysis = analysis_enabled && cached_analysis.is_none();

    let decoded = (staleness.is_stale() || needs_analysis)
        .then(|| imaging::load_oriented(ctx.store, &asset.source_path));
    if let Some(Err(e)) = &decoded {
        warn!("{e}");
    }
    let image = decoded.as_ref().and_then(|d| d.as_ref().ok());

    // Thumbnail
    let (thumbnail, artifact) = match staleness {
        Staleness::Fresh => (ThumbnailStatus::Fresh, previous_artifact.cloned()),
        Staleness::Stale(reason) => {
            debug!("{key}: thumbnail {reason}");
            match image.map(|img| write_thumbnail(ctx, asset, img, &paths.thumbnail)) {
                Some(Ok(())) => (
                    ThumbnailStatus::Regenerated(reason),
                    Some(ThumbnailArtifact {
                        source_modified: asset.modified,
                        fingerprint: ctx.thumbnail_fingerprint.clone(),
                    }),
                ),
                Some(Err(e)) => {
                    warn!("{key}: thumbnail not written: {e}");
                    (ThumbnailStatus::Failed, previous_artifact.cloned())
                }
                None => (ThumbnailStatus::Failed, previous_artifact.cloned()),
            }
        }
    };

    // Text and color
    let (analysis, text, color, analysis_entry) = if !analysis_enabled {
        (AnalysisStatus::Disabled, String::new(), FALLBACK_COLOR.to_string(), None)
    } else if let Some(cached) = cached_analysis {
        (
            AnalysisStatus::Cached,
            cached.text.clone(),
            cached.color.clone(),
            Some(cached.clone()),
        )
    } else {
        analyze(ctx, asset, image)
    };

    let copied = ctx.config.images.copy_originals && copy_original(ctx, asset, &paths.copy);

    let thumb_url = if matches!(ctx.store.modified(&paths.thumbnail), Ok(Some(_))) {
        asset.thumb_url()
    } else {
        asset.url()
    };

    AssetOutcome {
        record: ManifestRecord {
            folder: asset.folder.clone(),
            filename: asset.filename.clone(),
            text,
            color,
            url: asset.url(),
            thumb_url,
        },
        key,
        thumbnail,
        analysis,
        copied,
        entry: CacheEntry {
            thumbnail: artifact,
            analysis: analysis_entry,
        },
    }
}

#[derive(Error, Debug)]
enum ThumbnailWriteError {
    #[error(transparent)]
    Encode(#[from] imaging::EncodeError),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

fn write_thumbnail<S: Store>(
    ctx: &Context<'_, S>,
    asset: &ImageAsset,
    image: &DynamicImage,
    path: &Path,
) -> Result<(), ThumbnailWriteError> {
    let format = imaging::thumbnail_format(&asset.source_path)?;
    let thumb = imaging::create_thumbnail(image, &ctx.config.thumbnails);
    let bytes = imaging::encode(&thumb, format)?;
    store::write_atomic(ctx.store, path, &bytes)?;
    Ok(())
}

/// Compute text and color from the decoded image. Degraded results are
/// returned without a cache entry so they are retried next run.
fn analyze<S: Store>(
    ctx: &Context<'_, S>,
    asset: &ImageAsset,
    image: Option<&DynamicImage>,
) -> (AnalysisStatus, String, String, Option<AnalysisEntry>) {
    let key = asset.key();
    let Some(image) = image else {
        return (
            AnalysisStatus::Degraded,
            String::new(),
            FALLBACK_COLOR.to_string(),
            None,
        );
    };
    let mut degraded = false;

    let text = if ctx.config.ocr.enabled {
        match ctx.recognizer.recognize(image) {
            Ok(raw) => normalize_text(&raw),
            Err(e) => {
                warn!("{key}: text extraction failed: {e}");
                degraded = true;
                String::new()
            }
        }
    } else {
        String::new()
    };

    let color = if ctx.config.color_sample.enabled {
        imaging::sample_color(image, &ctx.config.color_sample).unwrap_or_else(|| {
            warn!("{key}: empty color sample region");
            degraded = true;
            FALLBACK_COLOR.to_string()
        })
    } else {
        FALLBACK_COLOR.to_string()
    };

    if degraded {
        return (AnalysisStatus::Degraded, text, color, None);
    }
    let entry = AnalysisEntry {
        source_modified: asset.modified,
        fingerprint: ctx.analysis_fingerprint.clone(),
        text: text.clone(),
        color: color.clone(),
    };
    (AnalysisStatus::Computed, text, color, Some(entry))
}

/// Copy the source to the output tree if the copy is missing or older.
/// Returns true when a copy was written.
fn copy_original<S: Store>(ctx: &Context<'_, S>, asset: &ImageAsset, dest: &Path) -> bool {
    if in_source_tree(&ctx.config.source_root, dest) {
        return false;
    }
    let up_to_date = match ctx.store.modified(dest) {
        Ok(Some(copy_modified)) => asset.modified <= copy_modified,
        _ => false,
    };
    if up_to_date {
        return false;
    }
    let result = ctx
        .store
        .read(&asset.source_path)
        .and_then(|bytes| store::write_atomic(ctx.store, dest, &bytes));
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("{}: copy to {} failed: {e}", asset.key(), dest.display());
            false
        }
    }
}

/// Remove outputs of assets that were built before but are gone from the
/// source tree. Returns the number of pruned assets.
fn prune_orphans(
    store: &impl Store,
    config: &GalleryConfig,
    previous: &BuildCache,
    folders: &[Folder],
) -> usize {
    let current: BTreeSet<String> = folders
        .iter()
        .flat_map(|f| f.assets.iter().map(ImageAsset::key))
        .collect();

    let mut pruned = 0;
    for key in previous.entries.keys() {
        if current.contains(key) {
            continue;
        }
        let Some((folder, filename)) = key.split_once('/') else {
            continue;
        };
        let paths = asset_paths(&config.output_root, folder, filename);
        // Thumbnails are always derived; a copy path inside the source tree is
        // the source file itself.
        let mut targets = vec![&paths.thumbnail];
        if !in_source_tree(&config.source_root, &paths.copy) {
            targets.push(&paths.copy);
        }
        for path in targets {
            if matches!(store.modified(path), Ok(Some(_)))
                && let Err(e) = store.remove(path)
            {
                warn!("failed to remove {}: {e}", path.display());
            }
        }
        debug!("{key}: pruned");
        pruned += 1;
    }
    pruned
}

/// True if `path` is `source_root` or lies under it.
fn in_source_tree(source_root: &Path, path: &Path) -> bool {
    let plain = |p: &Path| -> PathBuf {
        p.components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect()
    };
    plain(path).starts_with(plain(source_root))
}

fn tally(outcomes: &[AssetOutcome]) -> CacheStats {
    let mut stats = CacheStats::default();
    for outcome in outcomes {
        match outcome.thumbnail {
            ThumbnailStatus::Fresh => stats.thumbnails_fresh += 1,
            ThumbnailStatus::Regenerated(_) => stats.thumbnails_generated += 1,
            ThumbnailStatus::Failed => stats.thumbnails_failed += 1,
        }
        match outcome.analysis {
            AnalysisStatus::Cached => stats.analyses_cached += 1,
            AnalysisStatus::Computed | AnalysisStatus::Degraded => stats.analyses_computed += 1,
            AnalysisStatus::Disabled => {}
        }
    }
    stats
}

/// Thumbnail staleness of every asset, without writing anything.
#[derive(Debug)]
pub struct CheckReport {
    pub folders: Vec<Folder>,
    pub stale: Vec<(String, StaleReason)>,
}

/// Scan and report which thumbnails a build would regenerate.
pub fn check(store: &impl Store, config: &GalleryConfig) -> Result<CheckReport, ScanError> {
    let folders = scan::scan(store, config)?;
    let cache = BuildCache::load(store, &config.output_root);
    let fingerprint = cache::hash_thumbnail_params(config.thumbnails.max_size);

    let stale = folders
        .iter()
        .flat_map(|f| &f.assets)
        .filter_map(|asset| {
            let key = asset.key();
            let thumb = asset_paths(&config.output_root, &asset.folder, &asset.filename).thumbnail;
            let on_disk = matches!(store.modified(&thumb), Ok(Some(_)));
            match staleness::assess(asset.modified, cache.thumbnail(&key), on_disk, &fingerprint) {
                Staleness::Fresh => None,
                Staleness::Stale(reason) => Some((key, reason)),
            }
        })
        .collect();

    Ok(CheckReport { folders, stale })
}
