//! Decoding with orientation correction.
//!
//! Cameras and scanners often store pixels sideways and record the display
//! rotation in an EXIF orientation tag. Every consumer of pixels (thumbnail,
//! OCR, color sampling) must see the upright image, so orientation is applied
//! here, once, right after decoding.

use crate::store::Store;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to decode {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Read `path` through the store and decode it upright.
pub fn load_oriented(store: &impl Store, path: &Path) -> Result<DynamicImage, DecodeError> {
    let bytes = store.read(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_oriented(path, &bytes)
}

/// Decode in-memory bytes (format sniffed from content) and apply the
/// embedded orientation. `path` is only used for error reporting.
pub fn decode_oriented(path: &Path, bytes: &[u8]) -> Result<DynamicImage, DecodeError> {
    let image_err = |source: image::ImageError| DecodeError::Image {
        path: path.to_path_buf(),
        source,
    };

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let mut decoder = reader.into_decoder().map_err(image_err)?;
    // A malformed orientation tag is not worth failing the image over.
    let orientation = decoder.orientation().ok();
    let mut img = DynamicImage::from_decoder(decoder).map_err(image_err)?;
    if let Some(orientation) = orientation {
        img.apply_orientation(orientation);
    }
    Ok(img)
}
