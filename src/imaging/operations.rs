//! High-level image operations.
//!
//! These functions combine the pure calculations with the `image` crate.
//! They take an already decoded, upright image and never touch storage.

use super::calculations::{fit_within, sample_region};
use crate::config::{ColorSampleConfig, ThumbnailsConfig};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

/// Returned when no region could be sampled.
pub const FALLBACK_COLOR: &str = "#000000";

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("No encoder for {0}")]
    UnsupportedFormat(String),
    #[error("Encoding failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Thumbnail format for a source file: the same as the source.
pub fn thumbnail_format(source: &Path) -> Result<ImageFormat, EncodeError> {
    ImageFormat::from_path(source)
        .ok()
        .filter(|f| f.writing_enabled())
        .ok_or_else(|| EncodeError::UnsupportedFormat(source.display().to_string()))
}

/// Scale `img` to fit the configured bound.
pub fn create_thumbnail(img: &DynamicImage, config: &ThumbnailsConfig) -> DynamicImage {
    let (w, h) = fit_within((img.width(), img.height()), config.max_size);
    if (w, h) == (img.width(), img.height()) {
        return img.clone();
    }
    img.resize_exact(w, h, FilterType::Lanczos3)
}

/// Encode an image in `format`.
///
/// JPEG has no alpha channel, so it always gets RGB8; other formats get
/// RGBA8 or RGB8 depending on whether the source has alpha.
pub fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, EncodeError> {
    let converted = if format == ImageFormat::Jpeg || !img.color().has_alpha() {
        DynamicImage::ImageRgb8(img.to_rgb8())
    } else {
        DynamicImage::ImageRgba8(img.to_rgba8())
    };
    let mut buf = Cursor::new(Vec::new());
    converted.write_to(&mut buf, format)?;
    Ok(buf.into_inner())
}

/// Mean color of the configured corner region as `#rrggbb`.
///
/// Channel means are truncated. Returns `None` for an empty region.
pub fn sample_color(img: &DynamicImage, config: &ColorSampleConfig) -> Option<String> {
    let (x, y, w, h) = sample_region((img.width(), img.height()), config.corner, config.size)?;
    let region = img.crop_imm(x, y, w, h).to_rgb8();

    let mut sums = [0u64; 3];
    for pixel in region.pixels() {
        for (sum, channel) in sums.iter_mut().zip(pixel.0) {
            *sum += u64::from(channel);
        }
    }
    let count = u64::from(w) * u64::from(h);
    let [r, g, b] = sums.map(|s| s / count);
    Some(format!("#{r:02x}{g:02x}{b:02x}"))
}
