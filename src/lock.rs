//! Run-level locking of the output root.
//!
//! Two builds writing the same output tree would race on thumbnails, the
//! cache file and the manifest. A build therefore holds an advisory
//! exclusive lock on `<output_root>/.card-gallery.lock` for its whole
//! duration. A second build waits until the first releases it.
//!
//! Uses `fs2` (flock / LockFileEx). The lock is released when the
//! [`RunLock`] guard is dropped, including on panic or early return.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const LOCK_FILENAME: &str = ".card-gallery.lock";

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Output is locked by another build: {0}")]
    Locked(PathBuf),

    #[error("Failed to create lock file {path}: {source}")]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to acquire lock: {0}")]
    AcquireFailed(#[source] io::Error),
}

/// Held for the duration of a build.
pub struct RunLock {
    _file: File,
    lock_path: PathBuf,
}

impl RunLock {
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        debug!("Releasing run lock: {}", self.lock_path.display());
        // Closing the file releases the lock.
    }
}

impl std::fmt::Debug for RunLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLock")
            .field("lock_path", &self.lock_path)
            .finish()
    }
}

pub fn lock_path_for(output_root: &Path) -> PathBuf {
    output_root.join(LOCK_FILENAME)
}

fn open_lock_file(output_root: &Path) -> Result<(File, PathBuf), LockError> {
    let lock_path = lock_path_for(output_root);
    let create_failed = |source: io::Error| LockError::CreateFailed {
        path: lock_path.clone(),
        source,
    };
    fs::create_dir_all(output_root).map_err(create_failed)?;
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(create_failed)?;
    Ok((file, lock_path))
}

/// Try to lock the output root without blocking.
///
/// Returns `Err(LockError::Locked)` immediately if another build holds it.
pub fn try_lock(output_root: &Path) -> Result<RunLock, LockError> {
    let (file, lock_path) = open_lock_file(output_root)?;
    match file.try_lock_exclusive() {
        Ok(()) => {
            debug!("Acquired run lock: {}", lock_path.display());
            Ok(RunLock {
                _file: file,
                lock_path,
            })
        }
        Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
            Err(LockError::Locked(lock_path))
        }
        Err(e) => Err(LockError::AcquireFailed(e)),
    }
}

/// Lock the output root, waiting for any running build to finish.
pub fn lock(output_root: &Path) -> Result<RunLock, LockError> {
    match try_lock(output_root) {
        Err(LockError::Locked(path)) => {
            info!("Waiting for another build to release {}", path.display());
            let (file, lock_path) = open_lock_file(output_root)?;
            file.lock_exclusive().map_err(LockError::AcquireFailed)?;
            debug!("Acquired run lock: {}", lock_path.display());
            Ok(RunLock {
                _file: file,
                lock_path,
            })
        }
        other => other,
    }
}
