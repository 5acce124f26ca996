//! Thumbnail staleness decisions.
//!
//! A thumbnail is reused only when all three hold:
//!
//! 1. the artifact exists (a cache record *and* the file on disk),
//! 2. the source has not been modified after the recorded generation time,
//! 3. the recorded size fingerprint matches the configured bounds.
//!
//! [`assess`] is a pure function; the caller performs the `stat` of the
//! thumbnail file and looks up the cache record.

use crate::cache::ThumbnailArtifact;
use std::fmt;
use std::time::SystemTime;

/// Why a thumbnail must be regenerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// No record, or the file is gone.
    Missing,
    /// The source is strictly newer than the recorded generation time.
    SourceChanged,
    /// Thumbnail bounds changed since generation.
    ConfigChanged,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::Missing => f.write_str("missing"),
            StaleReason::SourceChanged => f.write_str("source changed"),
            StaleReason::ConfigChanged => f.write_str("size changed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    Fresh,
    Stale(StaleReason),
}

impl Staleness {
    pub fn is_stale(self) -> bool {
        matches!(self, Staleness::Stale(_))
    }
}

/// True when the source is strictly newer than the version a derived result
/// was produced from. Shared by thumbnails and cached analyses so both are
/// invalidated by the same edits.
pub fn source_changed(source_modified: SystemTime, recorded: SystemTime) -> bool {
    source_modified > recorded
}

/// Decide whether the thumbnail of an asset modified at `source_modified`
/// is up to date.
pub fn assess(
    source_modified: SystemTime,
    artifact: Option<&ThumbnailArtifact>,
    artifact_on_disk: bool,
    fingerprint: &str,
) -> Staleness {
    let Some(artifact) = artifact.filter(|_| artifact_on_disk) else {
        return Staleness::Stale(StaleReason::Missing);
    };
    if source_changed(source_modified, artifact.source_modified) {
        return Staleness::Stale(StaleReason::SourceChanged);
    }
    if artifact.fingerprint != fingerprint {
        return Staleness::Stale(StaleReason::ConfigChanged);
    }
    Staleness::Fresh
}
