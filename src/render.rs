//! Static HTML pages built from the manifest.
//!
//! The renderer is a pure consumer of `cards.json`: it never looks at the
//! source tree or the build cache, so `card-gallery render` can rebuild the
//! pages from any manifest.
//!
//! ## Generated Pages
//!
//! - **Index page** (`index.html`): folder list plus a search box. The search
//!   script fetches `cards.json` and filters by filename and text.
//! - **Folder pages** (`<folder>.html`): card grid. Each card shows the
//!   thumbnail linking to the full-size image, the title in the card's
//!   sampled color, and the first 150 characters of its text.
//!
//! ## CSS and JavaScript
//!
//! Static assets are embedded at compile time:
//! - `static/style.css`: Shared styles
//! - `static/search.js`: Index page search
//!
//! HTML is built with [maud](https://maud.lambda.xyz/); all interpolated
//! card data is escaped.

use crate::manifest::{self, ManifestError};
use crate::store::{self, Store};
use crate::types::{MANIFEST_FILENAME, ManifestRecord};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CSS: &str = include_str!("../static/style.css");
const JS: &str = include_str!("../static/search.js");

/// Characters of card text shown on folder pages.
const EXCERPT_CHARS: usize = 150;

const INDEX_PAGE: &str = "index.html";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One generated folder page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderPage {
    pub folder: String,
    pub filename: String,
    pub card_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    pub pages: Vec<FolderPage>,
}

/// Read `cards.json` from the output root and write all pages next to it.
pub fn render(store: &impl Store, output_root: &Path) -> Result<RenderResult, RenderError> {
    let records = manifest::read_manifest(store, output_root)?;
    render_records(store, output_root, &records)
}

/// Write pages for already loaded records.
pub fn render_records(
    store: &impl Store,
    output_root: &Path,
    records: &[ManifestRecord],
) -> Result<RenderResult, RenderError> {
    let groups = group_by_folder(records);
    let filenames = page_filenames(groups.iter().map(|(name, _)| *name));

    let links: Vec<(&str, &str)> = groups
        .iter()
        .zip(&filenames)
        .map(|((name, _), file)| (*name, file.as_str()))
        .collect();
    write_page(store, &output_root.join(INDEX_PAGE), render_index(&links))?;

    let mut pages = Vec::with_capacity(groups.len());
    for ((folder, cards), filename) in groups.iter().zip(filenames) {
        write_page(store, &output_root.join(&filename), render_folder(folder, cards))?;
        pages.push(FolderPage {
            folder: folder.to_string(),
            filename,
            card_count: cards.len(),
        });
    }
    Ok(RenderResult { pages })
}

fn write_page(store: &impl Store, path: &Path, markup: Markup) -> Result<(), RenderError> {
    store::write_atomic(store, path, markup.into_string().as_bytes()).map_err(|source| {
        RenderError::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Group consecutive records by folder, keeping manifest order.
fn group_by_folder(records: &[ManifestRecord]) -> Vec<(&str, Vec<&ManifestRecord>)> {
    let mut groups: Vec<(&str, Vec<&ManifestRecord>)> = Vec::new();
    for record in records {
        if let Some((folder, cards)) = groups.last_mut()
            && *folder == record.folder
        {
            cards.push(record);
            continue;
        }
        groups.push((record.folder.as_str(), vec![record]));
    }
    groups
}

/// Page filename per folder: `<folder>.html`, or `<folder>-<n>.html` when
/// that name is already taken (a folder called `index`).
pub fn page_filenames<'a>(folders: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::from([INDEX_PAGE.to_string()]);
    folders
        .into_iter()
        .map(|folder| {
            let mut filename = format!("{folder}.html");
            let mut n = 2;
            while taken.contains(&filename.to_lowercase()) {
                filename = format!("{folder}-{n}.html");
                n += 1;
            }
            taken.insert(filename.to_lowercase());
            filename
        })
        .collect()
}

/// Card title: the filename without its extension.
fn card_title(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
}

/// First [`EXCERPT_CHARS`] characters, with `...` when cut.
fn excerpt(text: &str) -> String {
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

// ============================================================================
// HTML Components
// ============================================================================

/// Renders the base HTML document structure
fn base_document(title: &str, manifest_url: Option<&str>, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (PreEscaped(CSS)) }
            }
            body data-manifest=[manifest_url] {
                (content)
            }
        }
    }
}

fn render_index(folders: &[(&str, &str)]) -> Markup {
    let content = html! {
        h1 { "Card Gallery" }
        input #search-input type="search" placeholder="Search cards by name or text...";
        button #back-button .back type="button" hidden { "\u{2b05} Back" }
        div #search-results {}
        ul #folder-list .folders {
            @for (folder, filename) in folders {
                li { a href=(filename) { (folder) } }
            }
        }
        script { (PreEscaped(JS)) }
    };
    base_document("Card Gallery", Some(MANIFEST_FILENAME), content)
}

fn render_card(card: &ManifestRecord) -> Markup {
    html! {
        div.card {
            a href=(card.url) target="_blank" rel="noopener noreferrer" {
                img src=(card.thumb_url) alt=(card.filename) loading="lazy";
            }
            h3.card-title style={ "color: " (card.color) } { (card_title(&card.filename)) }
            p { (excerpt(&card.text)) }
        }
    }
}

fn render_folder(folder: &str, cards: &[&ManifestRecord]) -> Markup {
    let title = format!("{folder} Gallery");
    let content = html! {
        a.back-link href=(INDEX_PAGE) { "\u{2190} Back to all sets" }
        h1 { (title) }
        div.card-container {
            @for card in cards {
                (render_card(card))
            }
        }
    };
    base_document(&title, None, content)
}
