//! Optical character recognition.
//!
//! [`TextRecognizer`] is the seam between the pipeline and an OCR engine.
//! The production implementation, [`TesseractCli`], runs the `tesseract`
//! executable as a subprocess:
//!
//! ```text
//! tesseract stdin stdout -l <language> [--psm <mode>]
//! ```
//!
//! The oriented image is streamed as PNG on stdin and the recognized text is
//! read from stdout. Recognition output is collapsed to a single line by
//! [`normalize_text`] before it reaches the manifest.

use image::{DynamicImage, ImageFormat};
use std::io::{Cursor, Write};
use std::process::{Command, Stdio};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecognitionError {
    #[error("OCR engine `{command}` could not be started: {source}")]
    Unavailable {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to encode image for OCR: {0}")]
    Encode(#[from] image::ImageError),
    #[error("IO error talking to OCR engine: {0}")]
    Io(#[from] std::io::Error),
    #[error("OCR failed: {0}")]
    Failed(String),
}

/// An OCR engine.
///
/// Implementations must be `Sync`: the pipeline calls [`recognize`] from
/// rayon workers.
///
/// [`recognize`]: TextRecognizer::recognize
pub trait TextRecognizer: Sync {
    /// Raw recognized text of an upright image.
    fn recognize(&self, image: &DynamicImage) -> Result<String, RecognitionError>;

    /// Stable description of the engine and its settings. Part of the
    /// analysis fingerprint: a change here invalidates cached text.
    fn identity(&self) -> String;
}

/// Collapse every whitespace run (line breaks included) into one space and
/// trim both ends.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Tesseract invoked through its command-line interface.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    command: String,
    language: String,
    psm: Option<u8>,
}

impl TesseractCli {
    pub fn new(command: impl Into<String>, language: impl Into<String>, psm: Option<u8>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
            psm,
        }
    }

    pub fn from_config(config: &crate::config::OcrConfig) -> Self {
        Self::new(&config.command, &config.language, config.psm)
    }

    /// Arguments passed to the executable.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.language.clone(),
        ];
        if let Some(psm) = self.psm {
            args.push("--psm".to_string());
            args.push(psm.to_string());
        }
        args
    }

    /// Check that the executable can be started, returning the first line of
    /// its `--version` output.
    pub fn probe(&self) -> Result<String, RecognitionError> {
        let output = Command::new(&self.command)
            .arg("--version")
            .output()
            .map_err(|source| RecognitionError::Unavailable {
                command: self.command.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(RecognitionError::Failed(format!(
                "`{} --version` exited with {}",
                self.command, output.status
            )));
        }
        // Older releases print the version banner on stderr.
        let banner = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(String::from_utf8_lossy(&banner)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}

impl TextRecognizer for TesseractCli {
    fn recognize(&self, image: &DynamicImage) -> Result<String, RecognitionError> {
        let mut png = Cursor::new(Vec::new());
        image.write_to(&mut png, ImageFormat::Png)?;
        let png = png.into_inner();

        let mut child = Command::new(&self.command)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RecognitionError::Unavailable {
                command: self.command.clone(),
                source,
            })?;

        // Feed stdin from a separate thread so a full stdout pipe can't deadlock us.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| RecognitionError::Failed("stdin not captured".into()))?;
        let writer = std::thread::spawn(move || stdin.write_all(&png));

        let output = child.wait_with_output()?;
        let written = writer
            .join()
            .map_err(|_| RecognitionError::Failed("stdin writer panicked".into()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RecognitionError::Failed(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }
        if let Err(e) = written {
            // The engine may stop reading once it has what it needs.
            tracing::debug!("OCR stdin closed early: {e}");
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn identity(&self) -> String {
        match self.psm {
            Some(psm) => format!("tesseract:{}:psm{psm}", self.language),
            None => format!("tesseract:{}", self.language),
        }
    }
}
