//! # Card Gallery
//!
//! Turns a directory of scanned card images into a browsable static site:
//! size-bounded thumbnails, a searchable `cards.json` manifest carrying the
//! OCR text and a representative color of every card, and HTML pages that
//! read that manifest.
//!
//! # Architecture: Incremental Pipeline
//!
//! ```text
//! 1. Scan      CardImages/  →  folders of assets      (read-only)
//! 2. Process   assets       →  thumbnails, copies     (skips fresh work)
//!                           →  text + color per card  (cached by mtime + settings)
//!                           →  cards.json             (atomic replace)
//! 3. Render    cards.json   →  index.html, <folder>.html
//! ```
//!
//! The manifest is the only contract between processing and rendering. It is
//! rebuilt completely on every run and ordered by `(folder, filename)`, so
//! unchanged input produces a byte-identical file.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`scan`] | Stage 1: finds folders and allow-listed images |
//! | [`staleness`] | Decides whether a thumbnail can be reused |
//! | [`imaging`] | Decoding with orientation, thumbnail scaling, color sampling |
//! | [`ocr`] | `TextRecognizer` trait and the `tesseract` subprocess backend |
//! | [`cache`] | `.cache-manifest.json`: thumbnail records and cached analyses |
//! | [`process`] | Stage 2: the parallel per-asset pipeline and orphan pruning |
//! | [`manifest`] | Ordering, duplicate check, atomic write of `cards.json` |
//! | [`render`] | Stage 3: HTML pages from the manifest using Maud |
//! | [`store`] | File-system seam; every read and write goes through it |
//! | [`lock`] | Advisory lock serializing builds into one output root |
//! | [`config`] | `gallery.toml` loading, merging, and validation |
//! | [`types`] | Shared types and the manifest record schema |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Staleness by Recorded Source Time
//!
//! A thumbnail's cache record stores the source modification time it was
//! generated from and a hash of the thumbnail bounds. The thumbnail is rebuilt
//! when the source is strictly newer, the bounds changed, or the file is gone.
//! Comparing against the recorded time rather than the thumbnail's own mtime
//! keeps the decision independent of clock skew between the two trees.
//!
//! ## OCR Is Cached Too
//!
//! Text recognition is the slowest stage by far. Text and color share the
//! thumbnail's invalidation rule: they are recomputed only when the source
//! changes or when OCR/sampling settings change. Failed analyses are never
//! cached, so a transient OCR failure heals on the next run.
//!
//! ## Failures Stay Local
//!
//! One unreadable image never aborts a build. It gets a degraded record
//! (empty text, `#000000`) and a warning; everything else proceeds. Only a
//! missing source root, an unwritable manifest or cache, or cancellation stop
//! the run.

pub mod cache;
pub mod config;
pub mod imaging;
pub mod lock;
pub mod manifest;
pub mod ocr;
pub mod output;
pub mod process;
pub mod render;
pub mod scan;
pub mod staleness;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
