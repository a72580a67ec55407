//! Source document loading.
//!
//! A document is turned into ordered [`DocumentPage`] records. Plain text and
//! Markdown files use form feeds (`\x0c`) as page separators, the same marker
//! `pdftotext` emits between PDF pages, so page numbers line up across formats.

#[cfg(test)]
mod tests;

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;
use std::sync::LazyLock;

use fancy_regex::Regex;
use pulldown_cmark::{Event, Parser, TagEnd};
use tracing::{debug, info, warn};

use crate::{ConciergeError, Result};

const PAGE_SEPARATOR: char = '\x0c';
const PDFTOTEXT_BIN: &str = "pdftotext";

static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("regex is valid"));

/// One page (or page-like unit) of a loaded document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPage {
    pub text: String,
    /// Zero-based position of the page in the source
    pub page: usize,
    /// Path of the source document, as given
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentKind {
    Text,
    Markdown,
    Pdf,
}

impl DocumentKind {
    fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("txt" | "text") => Ok(Self::Text),
            Some("md" | "markdown") => Ok(Self::Markdown),
            Some("pdf") => Ok(Self::Pdf),
            Some(other) => Err(ConciergeError::DocumentLoad(format!(
                "unsupported document type '.{other}' for {}",
                path.display()
            ))),
            None => Err(ConciergeError::DocumentLoad(format!(
                "cannot determine document type of {}",
                path.display()
            ))),
        }
    }
}

/// Load a document into ordered pages. Blank pages are dropped but keep their
/// position in the numbering.
#[inline]
pub fn load_document(path: &Path) -> Result<Vec<DocumentPage>> {
    if !path.exists() {
        return Err(ConciergeError::DocumentNotFound(path.to_path_buf()));
    }

    let kind = DocumentKind::from_path(path)?;
    debug!("Loading {:?} document from {}", kind, path.display());

    let raw_pages = match kind {
        DocumentKind::Text => split_pages(&read_utf8(path)?),
        DocumentKind::Markdown => split_pages(&read_utf8(path)?)
            .iter()
            .map(|page| markdown_to_text(page))
            .collect(),
        DocumentKind::Pdf => split_pages(&extract_pdf_text(path)?),
    };

    let source = path.display().to_string();
    let pages: Vec<DocumentPage> = raw_pages
        .into_iter()
        .enumerate()
        .map(|(page, text)| DocumentPage {
            text: normalize_page_text(&text),
            page,
            source: source.clone(),
        })
        .filter(|page| !page.text.is_empty())
        .collect();

    if pages.is_empty() {
        return Err(ConciergeError::DocumentLoad(format!(
            "no text could be extracted from {}",
            path.display()
        )));
    }

    info!("Loaded {} pages from {}", pages.len(), path.display());
    Ok(pages)
}

fn read_utf8(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| {
        ConciergeError::DocumentLoad(format!("failed to read {}: {}", path.display(), e))
    })?;

    String::from_utf8(bytes).map_err(|_| {
        ConciergeError::DocumentLoad(format!("{} is not valid UTF-8 text", path.display()))
    })
}

fn split_pages(text: &str) -> Vec<String> {
    let mut pages: Vec<String> = text.split(PAGE_SEPARATOR).map(str::to_string).collect();
    // A trailing separator ends the last page rather than opening a new one
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}

/// Extract PDF text with the poppler `pdftotext` tool; pages come back separated by form feeds.
fn extract_pdf_text(path: &Path) -> Result<String> {
    debug!("Extracting PDF text from {} with {}", path.display(), PDFTOTEXT_BIN);

    let output = Command::new(PDFTOTEXT_BIN)
        .arg("-layout")
        .arg("-enc")
        .arg("UTF-8")
        .arg(path)
        .arg("-")
        .output()
        .map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ConciergeError::DocumentLoad(format!(
                    "{PDFTOTEXT_BIN} is not installed; install poppler-utils to ingest PDF files"
                ))
            } else {
                ConciergeError::DocumentLoad(format!("failed to run {PDFTOTEXT_BIN}: {e}"))
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        warn!("{} failed for {}: {}", PDFTOTEXT_BIN, path.display(), stderr.trim());
        return Err(ConciergeError::DocumentLoad(format!(
            "{} could not read {}: {}",
            PDFTOTEXT_BIN,
            path.display(),
            stderr.trim()
        )));
    }

    String::from_utf8(output.stdout).map_err(|_| {
        ConciergeError::DocumentLoad(format!(
            "{PDFTOTEXT_BIN} produced invalid UTF-8 for {}",
            path.display()
        ))
    })
}

/// Flatten Markdown into plain text, one blank line between blocks
fn markdown_to_text(markdown: &str) -> String {
    let mut text = String::with_capacity(markdown.len());

    for event in Parser::new(markdown) {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak => text.push('\n'),
            Event::End(
                TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::CodeBlock | TagEnd::Item,
            )
            | Event::Rule => text.push_str("\n\n"),
            _ => {}
        }
    }

    text
}

fn normalize_page_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    EXCESS_NEWLINES
        .replace_all(&unified, "\n\n")
        .trim()
        .to_string()
}
