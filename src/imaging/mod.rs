//! Image processing on top of the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `ImageReader` with sniffed format |
//! | **Orientation** | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | **Thumbnail** | `resize_exact` with `Lanczos3`, bound computed by [`fit_within`] |
//! | **Color sample** | `crop_imm` + per-channel mean |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Decode**: Bytes to an upright [`image::DynamicImage`]
//! - **Operations**: Thumbnail scaling, encoding, and color sampling

mod calculations;
mod decode;
mod operations;

pub use calculations::{Region, fit_within, sample_region};
pub use decode::{DecodeError, decode_oriented, load_oriented};
pub use operations::{
    EncodeError, FALLBACK_COLOR, create_thumbnail, encode, sample_color, thumbnail_format,
};
