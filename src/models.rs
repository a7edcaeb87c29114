//! Core data models used throughout the filing pipeline.
//!
//! These types represent the links, documents, chunks, answers and quotes
//! that flow between acquisition, indexing, answering and market lookup.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A downloadable document found on a company page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLink {
    pub source_url: String,
    pub suggested_filename: String,
    /// Always `None` at discovery; the kind is only known after download.
    pub discovered_kind: Option<DocumentKind>,
}

/// What a downloaded filing turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Transcript,
    Presentation,
    FinancialReport,
    Unclassified,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Transcript => "transcript",
            DocumentKind::Presentation => "presentation",
            DocumentKind::FinancialReport => "financial_report",
            DocumentKind::Unclassified => "unclassified",
        }
    }

    /// Kind implied by a `{kind}_` file name prefix.
    pub fn from_file_name(name: &str) -> DocumentKind {
        [
            DocumentKind::Transcript,
            DocumentKind::Presentation,
            DocumentKind::FinancialReport,
        ]
        .into_iter()
        .find(|kind| name.starts_with(&format!("{}_", kind.as_str())))
        .unwrap_or(DocumentKind::Unclassified)
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document saved to the documents directory.
#[derive(Debug, Clone)]
pub struct DownloadedDocument {
    pub local_path: PathBuf,
    pub origin_url: String,
    pub classified_kind: DocumentKind,
    /// Creation (or modification) date read from the document metadata.
    pub creation_timestamp: Option<DateTime<Utc>>,
}

/// A window of a document's extracted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    pub id: String,
    /// File name of the document the text came from.
    pub source_document_id: String,
    pub chunk_index: usize,
    /// Character offset of the first character (inclusive).
    pub start: usize,
    /// Character offset one past the last character.
    pub end: usize,
    /// Characters shared with the previous chunk of the same document.
    pub overlap: usize,
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
}

/// A retrieved chunk together with its similarity to the query.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub score: f32,
    pub chunk: TextChunk,
}

/// Per-metric trend note in a structured answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricTrend {
    pub metric: String,
    pub note: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Positive,
    Neutral,
    Negative,
    Uncertain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// The fixed answer schema the language model must produce.
///
/// The degraded path fills the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredAnswer {
    pub summary: String,
    pub metric_trends: Vec<MetricTrend>,
    pub outlook: String,
    pub risks: Vec<String>,
    pub opportunities: Vec<String>,
    pub direction: Direction,
    pub confidence: Confidence,
    pub limitations: String,
    pub disclaimer: String,
    pub follow_up_question: String,
}

/// Result of one question against an index.
#[derive(Debug, Clone, Serialize)]
pub struct QueryAnswer {
    pub question: String,
    /// Ordered by score, descending.
    pub grounding_chunks: Vec<ScoredChunk>,
    pub structured_answer: StructuredAnswer,
    /// `true` when the answer was produced by the deterministic fallback.
    pub degraded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Ok,
    NoData,
    Error,
}

/// A live price, fetched fresh per request.
#[derive(Debug, Clone, Serialize)]
pub struct MarketQuote {
    pub symbol: String,
    pub price: Option<f64>,
    pub timestamp: DateTime<Utc>,
    pub status: QuoteStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Counts reported by a discover-and-download run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AcquisitionSummary {
    pub discovered: usize,
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub deleted: usize,
}

/// `QueryAnswer` plus the live price, as served to front ends.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastReport {
    pub company: String,
    pub answer: QueryAnswer,
    pub market: MarketQuote,
}
