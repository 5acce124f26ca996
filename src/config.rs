//! Gallery configuration module.
//!
//! Handles loading, validating, and merging the `gallery.toml` file. Every
//! pipeline component receives the resolved [`GalleryConfig`] explicitly; there
//! is no ambient state.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! source_root = "CardImages"   # <source_root>/<folder>/<file>
//! output_root = "docs"         # Derived tree, manifest and pages
//!
//! [images]
//! allowed_extensions = ["jpg", "jpeg", "png"]  # Case-insensitive
//! copy_originals = true        # Copy full-size images into the output tree
//!
//! [thumbnails]
//! max_size = [200, 300]        # Bounding box [width, height], never upscaled
//!
//! [color_sample]
//! enabled = true
//! corner = "top-right"         # top-left | top-right | bottom-left | bottom-right
//! size = [30, 30]              # Region [width, height], clipped to the image
//!
//! [ocr]
//! enabled = true
//! command = "tesseract"
//! language = "eng"
//! # psm = 6                    # Tesseract page segmentation mode
//!
//! [processing]
//! # max_processes = 4          # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse: override just the values you want. Unknown keys
//! are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Gallery configuration loaded from `gallery.toml`.
///
/// All fields have defaults matching the published card site layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GalleryConfig {
    /// Directory holding one sub-directory per card folder.
    pub source_root: PathBuf,
    /// Directory the pipeline owns: thumbnails, copies, manifest, pages.
    pub output_root: PathBuf,
    /// Which source files count as images.
    pub images: ImagesConfig,
    /// Thumbnail bounds.
    pub thumbnails: ThumbnailsConfig,
    /// Representative color sampling.
    pub color_sample: ColorSampleConfig,
    /// Optical character recognition.
    pub ocr: OcrConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("CardImages"),
            output_root: PathBuf::from("docs"),
            images: ImagesConfig::default(),
            thumbnails: ThumbnailsConfig::default(),
            color_sample: ColorSampleConfig::default(),
            ocr: OcrConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl GalleryConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thumbnails.max_size[0] == 0 || self.thumbnails.max_size[1] == 0 {
            return Err(ConfigError::Validation(
                "thumbnails.max_size values must be non-zero".into(),
            ));
        }
        if self.color_sample.size[0] == 0 || self.color_sample.size[1] == 0 {
            return Err(ConfigError::Validation(
                "color_sample.size values must be non-zero".into(),
            ));
        }
        if self.images.allowed_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "images.allowed_extensions must not be empty".into(),
            ));
        }
        if self
            .images
            .allowed_extensions
            .iter()
            .any(|e| e.trim().trim_start_matches('.').is_empty())
        {
            return Err(ConfigError::Validation(
                "images.allowed_extensions must not contain empty entries".into(),
            ));
        }
        if self.ocr.enabled && self.ocr.language.trim().is_empty() {
            return Err(ConfigError::Validation(
                "ocr.language must be set when ocr is enabled".into(),
            ));
        }
        if self.ocr.enabled && self.ocr.command.trim().is_empty() {
            return Err(ConfigError::Validation(
                "ocr.command must be set when ocr is enabled".into(),
            ));
        }
        Ok(())
    }

    /// True when `path` has an extension on the allow-list (case-insensitive,
    /// leading dots in configured entries are ignored).
    pub fn is_allowed_image(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.images
            .allowed_extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

/// Source image selection and full-size copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// File extensions treated as card images, without the dot.
    pub allowed_extensions: Vec<String>,
    /// Copy each source image to `<output_root>/CardImages/<folder>/<file>`.
    pub copy_originals: bool,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: vec!["jpg".into(), "jpeg".into(), "png".into()],
            copy_originals: true,
        }
    }
}

/// Thumbnail generation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsConfig {
    /// Bounding box as `[width, height]`.
    pub max_size: [u32; 2],
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            max_size: [200, 300],
        }
    }
}

/// Image corner a sample region is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Corner {
    pub fn as_str(self) -> &'static str {
        match self {
            Corner::TopLeft => "top-left",
            Corner::TopRight => "top-right",
            Corner::BottomLeft => "bottom-left",
            Corner::BottomRight => "bottom-right",
        }
    }
}

/// Representative color sampling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorSampleConfig {
    pub enabled: bool,
    pub corner: Corner,
    /// Region as `[width, height]`, clipped to the image bounds.
    pub size: [u32; 2],
}

impl Default for ColorSampleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            corner: Corner::TopRight,
            size: [30, 30],
        }
    }
}

/// Optical character recognition settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OcrConfig {
    pub enabled: bool,
    /// Tesseract executable name or path.
    pub command: String,
    /// Tesseract language code(s), e.g. `eng` or `eng+deu`.
    pub language: String,
    /// Page segmentation mode passed as `--psm`.
    pub psm: Option<u8>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: "tesseract".into(),
            language: "eng".into(),
            psm: None,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, at least one
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(GalleryConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value. `Ok(None)` when the file is absent.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<GalleryConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: GalleryConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file, falling back to stock defaults when it
/// does not exist.
pub fn load_config(path: &Path) -> Result<GalleryConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(path)?)
}

/// Returns a fully-commented stock `gallery.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Card Gallery Configuration
# ==========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Directory holding one sub-directory per card folder.
source_root = "CardImages"

# Directory the build owns: thumbnails, full-size copies, cards.json, pages.
output_root = "docs"

# ---------------------------------------------------------------------------
# Source images
# ---------------------------------------------------------------------------
[images]
# Extensions (case-insensitive) treated as card images.
allowed_extensions = ["jpg", "jpeg", "png"]

# Copy each image to <output_root>/CardImages/<folder>/<file>.
copy_originals = true

# ---------------------------------------------------------------------------
# Thumbnails
# ---------------------------------------------------------------------------
[thumbnails]
# Bounding box [width, height]. Aspect ratio is kept, images are never upscaled.
# Changing this regenerates every thumbnail on the next build.
max_size = [200, 300]

# ---------------------------------------------------------------------------
# Representative color
# ---------------------------------------------------------------------------
[color_sample]
enabled = true
# One of: top-left, top-right, bottom-left, bottom-right
corner = "top-right"
# Region [width, height], clipped to the image.
size = [30, 30]

# ---------------------------------------------------------------------------
# Text recognition (requires the tesseract executable)
# ---------------------------------------------------------------------------
[ocr]
enabled = true
command = "tesseract"
language = "eng"
# Page segmentation mode (tesseract --psm).
# psm = 6

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_matches_published_layout() {
        let config = GalleryConfig::default();
        assert_eq!(config.source_root, PathBuf::from("CardImages"));
        assert_eq!(config.output_root, PathBuf::from("docs"));
        assert_eq!(config.thumbnails.max_size, [200, 300]);
        assert_eq!(config.color_sample.corner, Corner::TopRight);
        assert_eq!(config.color_sample.size, [30, 30]);
        assert!(config.ocr.enabled);
        assert!(config.images.copy_originals);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[thumbnails]
max_size = [300, 300]
"#;
        let config: GalleryConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.thumbnails.max_size, [300, 300]);
        // Defaults preserved
        assert_eq!(config.color_sample.size, [30, 30]);
        assert_eq!(config.ocr.language, "eng");
    }

    #[test]
    fn parse_corner_kebab_case() {
        let toml = r#"
[color_sample]
corner = "bottom-left"
"#;
        let config: GalleryConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.color_sample.corner, Corner::BottomLeft);
    }

    #[test]
    fn allowed_image_is_case_insensitive() {
        let config = GalleryConfig::default();
        assert!(config.is_allowed_image(Path::new("a/Card.PNG")));
        assert!(config.is_allowed_image(Path::new("a/card.JpEg")));
        assert!(!config.is_allowed_image(Path::new("a/card.gif")));
        assert!(!config.is_allowed_image(Path::new("a/README")));
    }

    #[test]
    fn allowed_image_ignores_leading_dot_in_config() {
        let mut config = GalleryConfig::default();
        config.images.allowed_extensions = vec![".webp".into()];
        assert!(config.is_allowed_image(Path::new("x.webp")));
    }

    #[test]
    fn unknown_key_rejected() {
        let toml = r#"
[thumbnails]
max_size = [1, 1]
bogus = 3
"#;
        let result: Result<GalleryConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_corner_rejected() {
        let toml = r#"
[color_sample]
corner = "middle"
"#;
        let result: Result<GalleryConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn validate_default_config_passes() {
        assert!(GalleryConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_zero_thumbnail_bound() {
        let mut config = GalleryConfig::default();
        config.thumbnails.max_size = [0, 300];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn validate_zero_sample_size() {
        let mut config = GalleryConfig::default();
        config.color_sample.size = [30, 0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_empty_extensions() {
        let mut config = GalleryConfig::default();
        config.images.allowed_extensions.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_empty_language_only_matters_with_ocr() {
        let mut config = GalleryConfig::default();
        config.ocr.language = String::new();
        assert!(config.validate().is_err());
        config.ocr.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn effective_threads_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    #[test]
    fn effective_threads_clamped() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: Some(99_999),
        };
        assert_eq!(effective_threads(&config), cores);
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(3));
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("gallery.toml")).unwrap();
        assert_eq!(config, GalleryConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gallery.toml");
        fs::write(
            &path,
            r#"
source_root = "cards"
[ocr]
language = "deu"
"#,
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.source_root, PathBuf::from("cards"));
        assert_eq!(config.ocr.language, "deu");
        assert_eq!(config.ocr.command, "tesseract");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gallery.toml");
        fs::write(&path, "this is [not toml").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gallery.toml");
        fs::write(&path, "[thumbnails]\nmax_size = [0, 0]\n").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: GalleryConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, GalleryConfig::default());
    }
}
