//! Plain-text extraction from downloaded PDF filings.
//!
//! Two backends are tried in order: `pdf-extract` (better layout handling)
//! and then `lopdf` (more tolerant of odd font setups). The public
//! functions never fail; an unreadable document yields an empty string and
//! a warning in the log, so one bad filing never aborts an index build.

use std::path::Path;

use tracing::{debug, warn};

/// Extraction error for a single backend.
#[derive(Debug)]
pub enum ExtractError {
    Io(String),
    Pdf(String),
    Panicked,
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Io(e) => write!(f, "could not read document: {}", e),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Panicked => write!(f, "PDF backend panicked"),
        }
    }
}

impl std::error::Error for ExtractError {}

/// A text extraction backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractStrategy {
    PdfExtract,
    Lopdf,
}

/// Backends in the order they are attempted.
pub const STRATEGIES: [ExtractStrategy; 2] = [ExtractStrategy::PdfExtract, ExtractStrategy::Lopdf];

impl ExtractStrategy {
    pub fn run(self, bytes: &[u8]) -> Result<String, ExtractError> {
        // Both backends have been seen to panic on malformed streams.
        let bytes = bytes.to_vec();
        let result = std::panic::catch_unwind(move || match self {
            ExtractStrategy::PdfExtract => pdf_extract::extract_text_from_mem(&bytes)
                .map_err(|e| ExtractError::Pdf(e.to_string())),
            ExtractStrategy::Lopdf => extract_with_lopdf(&bytes, None),
        });
        result.unwrap_or(Err(ExtractError::Panicked))
    }
}

/// Extract all text from a PDF file. Returns `""` when nothing is readable.
pub fn extract_text(path: &Path) -> String {
    match std::fs::read(path) {
        Ok(bytes) => extract_text_from_bytes(&bytes, &path.display().to_string()),
        Err(e) => {
            warn!(path = %path.display(), error = %ExtractError::Io(e.to_string()), "skipping document");
            String::new()
        }
    }
}

/// Same as [`extract_text`] for an in-memory document; `label` is only
/// used in log lines.
pub fn extract_text_from_bytes(bytes: &[u8], label: &str) -> String {
    for strategy in STRATEGIES {
        match strategy.run(bytes) {
            Ok(text) if !text.trim().is_empty() => {
                debug!(document = label, ?strategy, chars = text.len(), "extracted text");
                return text;
            }
            Ok(_) => debug!(document = label, ?strategy, "backend returned no text"),
            Err(e) => debug!(document = label, ?strategy, error = %e, "backend failed"),
        }
    }
    warn!(document = label, "no extractable text; document contributes no chunks");
    String::new()
}

/// Text of the first `max_pages` pages only.
///
/// Falls back to a prefix of the full extraction when per-page parsing is
/// not possible.
pub fn extract_leading_pages(path: &Path, max_pages: usize) -> String {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read document");
            return String::new();
        }
    };

    let owned = bytes.clone();
    let paged = std::panic::catch_unwind(move || extract_with_lopdf(&owned, Some(max_pages)))
        .unwrap_or(Err(ExtractError::Panicked));
    match paged {
        Ok(text) if !text.trim().is_empty() => text,
        _ => {
            let full = extract_text_from_bytes(&bytes, &path.display().to_string());
            // Roughly three pages worth of text.
            full.chars().take(max_pages * 3000).collect()
        }
    }
}

fn extract_with_lopdf(bytes: &[u8], max_pages: Option<usize>) -> Result<String, ExtractError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    let mut pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    if let Some(limit) = max_pages {
        pages.truncate(limit);
    }
    if pages.is_empty() {
        return Ok(String::new());
    }
    doc.extract_text(&pages)
        .map_err(|e| ExtractError::Pdf(e.to_string()))
}
