//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use crate::config::Corner;

/// Calculate the dimensions of an image scaled to fit inside `bound`.
///
/// Preserves the aspect ratio and never upscales: an image already inside
/// the bound keeps its size. Neither output edge drops below 1px.
///
/// # Examples
/// ```
/// # use card_gallery::imaging::fit_within;
/// // 400x600 card into 200x300 → exact half
/// assert_eq!(fit_within((400, 600), [200, 300]), (200, 300));
///
/// // Landscape scan is limited by width
/// assert_eq!(fit_within((1000, 500), [200, 300]), (200, 100));
///
/// // Small images are left alone
/// assert_eq!(fit_within((100, 120), [200, 300]), (100, 120));
/// ```
pub fn fit_within(source: (u32, u32), bound: [u32; 2]) -> (u32, u32) {
    let (src_w, src_h) = source;
    let [max_w, max_h] = bound;

    if src_w <= max_w && src_h <= max_h {
        return (src_w, src_h);
    }

    let scale = (max_w as f64 / src_w as f64).min(max_h as f64 / src_h as f64);
    let w = ((src_w as f64 * scale).round() as u32).clamp(1, max_w);
    let h = ((src_h as f64 * scale).round() as u32).clamp(1, max_h);
    (w, h)
}

/// Pixel rectangle `(x, y, width, height)`.
pub type Region = (u32, u32, u32, u32);

/// Calculate the sampling rectangle anchored at `corner`, clipped to the
/// image. Returns `None` when the clipped region is empty.
pub fn sample_region(dims: (u32, u32), corner: Corner, size: [u32; 2]) -> Option<Region> {
    let (img_w, img_h) = dims;
    let w = size[0].min(img_w);
    let h = size[1].min(img_h);
    if w == 0 || h == 0 {
        return None;
    }

    let (x, y) = match corner {
        Corner::TopLeft => (0, 0),
        Corner::TopRight => (img_w - w, 0),
        Corner::BottomLeft => (0, img_h - h),
        Corner::BottomRight => (img_w - w, img_h - h),
    };
    Some((x, y, w, h))
}
