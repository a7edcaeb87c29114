//! Keyword classification of downloaded filings.
//!
//! Only the first few pages are read: the cover page of a transcript or
//! an investor deck says what it is. Keyword sets are checked in priority
//! order and the first hit wins.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::download::unique_path;
use crate::extract::extract_leading_pages;
use crate::models::DocumentKind;

/// Pages read for classification.
pub const CLASSIFY_PAGES: usize = 3;

/// Keyword sets in priority order.
const RULES: [(DocumentKind, &[&str]); 3] = [
    (
        DocumentKind::Transcript,
        &["transcript", "earnings call", "conference call"],
    ),
    (
        DocumentKind::Presentation,
        &["presentation", "investor presentation", "investor deck"],
    ),
    (
        DocumentKind::FinancialReport,
        &["financial results", "quarterly results", "annual report"],
    ),
];

pub fn classify_text(text: &str) -> DocumentKind {
    let lower = text.to_lowercase();
    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(kind, _)| *kind)
        .unwrap_or(DocumentKind::Unclassified)
}

pub fn classify_file(path: &Path) -> DocumentKind {
    classify_text(&extract_leading_pages(path, CLASSIFY_PAGES))
}

/// Classify `path` and rename it to `{kind}_{name}`.
///
/// Unclassified files and files already carrying the prefix keep their
/// name. A taken target name gets a counter suffix rather than being
/// overwritten.
pub fn apply(path: &Path) -> std::io::Result<(PathBuf, DocumentKind)> {
    let kind = classify_file(path);
    if kind == DocumentKind::Unclassified {
        return Ok((path.to_path_buf(), kind));
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let prefix = format!("{}_", kind.as_str());
    if name.starts_with(&prefix) {
        return Ok((path.to_path_buf(), kind));
    }

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let target = unique_path(dir, &format!("{}{}", prefix, name));
    std::fs::rename(path, &target)?;
    debug!(from = %path.display(), to = %target.display(), %kind, "classified document");
    Ok((target, kind))
}
