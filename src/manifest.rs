//! Manifest assembly and atomic write.
//!
//! The manifest (`cards.json`) is the only interface between the pipeline
//! and the pages that display it. It is rebuilt from scratch on every run:
//! one record per scanned asset, ordered by `(folder, filename)` in byte
//! order, so identical inputs always serialize to identical bytes.
//!
//! The file is replaced with [`write_atomic`](crate::store::write_atomic).
//! Readers see either the previous manifest or the new one, never a mix.

use crate::store::{self, Store};
use crate::types::{MANIFEST_FILENAME, ManifestRecord};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to write manifest {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Manifest JSON error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Duplicate manifest record for {folder}/{filename}")]
    DuplicateRecord { folder: String, filename: String },
}

/// Order records by `(folder, filename)` and reject duplicates.
pub fn assemble(mut records: Vec<ManifestRecord>) -> Result<Vec<ManifestRecord>, ManifestError> {
    records.sort_by(|a, b| (&a.folder, &a.filename).cmp(&(&b.folder, &b.filename)));
    if let Some(pair) = records
        .windows(2)
        .find(|w| w[0].folder == w[1].folder && w[0].filename == w[1].filename)
    {
        return Err(ManifestError::DuplicateRecord {
            folder: pair[0].folder.clone(),
            filename: pair[0].filename.clone(),
        });
    }
    Ok(records)
}

/// Pretty JSON with a trailing newline.
pub fn to_json(records: &[ManifestRecord]) -> Result<String, ManifestError> {
    let mut json = serde_json::to_string_pretty(records)?;
    json.push('\n');
    Ok(json)
}

pub fn manifest_path(output_root: &Path) -> PathBuf {
    output_root.join(MANIFEST_FILENAME)
}

/// Serialize and atomically replace `<output_root>/cards.json`.
pub fn write_manifest(
    store: &impl Store,
    output_root: &Path,
    records: &[ManifestRecord],
) -> Result<PathBuf, ManifestError> {
    let json = to_json(records)?;
    let path = manifest_path(output_root);
    store::write_atomic(store, &path, json.as_bytes()).map_err(|source| ManifestError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Load a previously written manifest.
pub fn read_manifest(
    store: &impl Store,
    output_root: &Path,
) -> Result<Vec<ManifestRecord>, ManifestError> {
    let path = manifest_path(output_root);
    let bytes = store
        .read(&path)
        .map_err(|source| ManifestError::Read { path, source })?;
    Ok(serde_json::from_slice(&bytes)?)
}
