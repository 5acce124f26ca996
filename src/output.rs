//! CLI output formatting for all commands.
//!
//! # Output Format
//!
//! ## Scan
//!
//! ```text
//! Folders
//! 001 Alpha (2 cards)
//!     001 Black Lotus.png
//!     002 Mox Pearl.jpg
//! 002 Beta (1 card)
//!     001 Shivan Dragon.jpeg
//! ```
//!
//! ## Build
//!
//! ```text
//! Alpha (2 cards)
//!     001 Black Lotus.png
//!         thumbnail: cached
//!         analysis: cached
//!     002 Mox Pearl.jpg
//!         thumbnail: generated (source changed)
//!         analysis: computed
//!         copied
//! ```
//!
//! ## Check
//!
//! ```text
//! 3 cards in 2 folders, 1 thumbnail stale
//!     Alpha/Mox Pearl.jpg: source changed
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::process::{
    AnalysisStatus, BuildResult, CheckReport, ProcessEvent, ThumbnailStatus,
};
use crate::render::RenderResult;
use crate::scan;
use crate::types::Folder;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("{n} {singular}")
    } else {
        format!("{n} {plural}")
    }
}

/// Folder header with its card count.
///
/// ```text
/// Alpha (2 cards)
/// ```
fn folder_header(name: &str, count: usize) -> String {
    format!("{} ({})", name, plural(count, "card", "cards"))
}

// ============================================================================
// Scan output
// ============================================================================

/// Format the discovered folders and their cards.
pub fn format_scan_output(folders: &[Folder]) -> Vec<String> {
    let mut lines = vec!["Folders".to_string()];
    if folders.is_empty() {
        lines.push(format!("{}(no card images found)", indent(1)));
        return lines;
    }
    for (i, folder) in folders.iter().enumerate() {
        lines.push(format!(
            "{} {}",
            format_index(i + 1),
            folder_header(&folder.name, folder.assets.len())
        ));
        for (j, asset) in folder.assets.iter().enumerate() {
            lines.push(format!(
                "{}{} {}",
                indent(1),
                format_index(j + 1),
                asset.filename
            ));
        }
    }
    lines
}

pub fn print_scan_output(folders: &[Folder]) {
    for line in format_scan_output(folders) {
        println!("{}", line);
    }
}

// ============================================================================
// Build output
// ============================================================================

fn thumbnail_status(status: ThumbnailStatus) -> String {
    match status {
        ThumbnailStatus::Fresh => "cached".to_string(),
        ThumbnailStatus::Regenerated(reason) => format!("generated ({reason})"),
        ThumbnailStatus::Failed => "FAILED".to_string(),
    }
}

fn analysis_status(status: AnalysisStatus) -> &'static str {
    match status {
        AnalysisStatus::Cached => "cached",
        AnalysisStatus::Computed => "computed",
        AnalysisStatus::Degraded => "degraded",
        AnalysisStatus::Disabled => "disabled",
    }
}

/// Format a single build progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::FolderStarted { name, asset_count } => {
            vec![folder_header(name, *asset_count)]
        }
        ProcessEvent::AssetProcessed {
            index,
            filename,
            thumbnail,
            analysis,
            copied,
            ..
        } => {
            let mut lines = vec![
                format!("{}{} {}", indent(1), format_index(*index), filename),
                format!("{}thumbnail: {}", indent(2), thumbnail_status(*thumbnail)),
                format!("{}analysis: {}", indent(2), analysis_status(*analysis)),
            ];
            if *copied {
                lines.push(format!("{}copied", indent(2)));
            }
            lines
        }
    }
}

/// Format the end-of-build summary.
pub fn format_build_summary(result: &BuildResult) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Built {} in {}",
            plural(result.records.len(), "card", "cards"),
            plural(result.folder_count, "folder", "folders")
        ),
        format!("Cache: {}", result.cache_stats),
    ];
    if result.pruned > 0 {
        lines.push(format!(
            "Removed {}",
            plural(result.pruned, "deleted card", "deleted cards")
        ));
    }
    lines.push(format!("Manifest: {}", result.manifest_path.display()));
    lines
}

pub fn print_build_summary(result: &BuildResult) {
    for line in format_build_summary(result) {
        println!("{}", line);
    }
}

// ============================================================================
// Check output
// ============================================================================

pub fn format_check_report(report: &CheckReport) -> Vec<String> {
    let mut lines = vec![format!(
        "{} in {}, {} stale",
        plural(scan::asset_count(&report.folders), "card", "cards"),
        plural(report.folders.len(), "folder", "folders"),
        plural(report.stale.len(), "thumbnail", "thumbnails"),
    )];
    for (key, reason) in &report.stale {
        lines.push(format!("{}{}: {}", indent(1), key, reason));
    }
    lines
}

pub fn print_check_report(report: &CheckReport) {
    for line in format_check_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Render output
// ============================================================================

/// Format rendered pages.
///
/// ```text
/// Home → index.html
/// Alpha → Alpha.html (2 cards)
/// ```
pub fn format_render_output(result: &RenderResult) -> Vec<String> {
    let mut lines = vec!["Home \u{2192} index.html".to_string()];
    for page in &result.pages {
        lines.push(format!(
            "{} \u{2192} {} ({})",
            page.folder,
            page.filename,
            plural(page.card_count, "card", "cards")
        ));
    }
    lines
}

pub fn print_render_output(result: &RenderResult) {
    for line in format_render_output(result) {
        println!("{}", line);
    }
}
