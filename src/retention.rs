//! Age-based retention of stored documents.
//!
//! A document's age comes from its own metadata (`/CreationDate`, falling
//! back to `/ModDate`), not from file system times, which reflect the
//! download rather than the filing. When no date can be read the document
//! is kept.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use lopdf::Object;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::download::stored_documents;

/// What the metadata said about a document's date.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentDate {
    Found(DateTime<Utc>),
    /// A date field exists but matches no known format.
    Unparseable(String),
    Missing,
}

impl DocumentDate {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            DocumentDate::Found(ts) => Some(*ts),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionDecision {
    Delete,
    Keep,
    /// No usable date; kept.
    Undated,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub deleted: usize,
    pub retained: usize,
    pub undated: usize,
    pub deleted_paths: Vec<PathBuf>,
}

/// Delete iff the age is strictly greater than `retention_days`. A negative
/// or unrepresentable window keeps everything.
pub fn decide(
    timestamp: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    retention_days: i64,
) -> RetentionDecision {
    let window = Some(retention_days)
        .filter(|days| *days >= 0)
        .and_then(Duration::try_days);
    match (timestamp, window) {
        (Some(ts), Some(window)) if now - ts > window => RetentionDecision::Delete,
        (Some(_), _) => RetentionDecision::Keep,
        (None, _) => RetentionDecision::Undated,
    }
}

pub fn sweep(dir: &Path, retention_days: i64) -> anyhow::Result<SweepReport> {
    sweep_at(dir, retention_days, Utc::now())
}

/// Sweep `dir` as if the current time were `now`.
pub fn sweep_at(
    dir: &Path,
    retention_days: i64,
    now: DateTime<Utc>,
) -> anyhow::Result<SweepReport> {
    let mut report = SweepReport::default();

    for path in stored_documents(dir)? {
        let date = document_date(&path);
        match decide(date.timestamp(), now, retention_days) {
            RetentionDecision::Delete => match std::fs::remove_file(&path) {
                Ok(()) => {
                    info!(path = %path.display(), "deleted document past retention");
                    report.deleted += 1;
                    report.deleted_paths.push(path);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot delete expired document");
                    report.retained += 1;
                }
            },
            RetentionDecision::Keep => {
                debug!(path = %path.display(), "retained");
                report.retained += 1;
            }
            RetentionDecision::Undated => {
                match &date {
                    DocumentDate::Unparseable(raw) => {
                        warn!(path = %path.display(), raw = %raw, "unparseable document date, keeping")
                    }
                    _ => warn!(path = %path.display(), "document has no date metadata, keeping"),
                }
                report.undated += 1;
            }
        }
    }

    Ok(report)
}

/// Read `/CreationDate`, then `/ModDate`, from the document info dictionary.
pub fn document_date(path: &Path) -> DocumentDate {
    let doc = match lopdf::Document::load(path) {
        Ok(doc) => doc,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "cannot open document for metadata");
            return DocumentDate::Missing;
        }
    };

    let info = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => doc.get_object(*id).and_then(Object::as_dict).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };
    let Some(info) = info else {
        return DocumentDate::Missing;
    };

    let mut first_raw = None;
    for key in [b"CreationDate".as_slice(), b"ModDate".as_slice()] {
        let value = match info.get(key) {
            Ok(Object::Reference(id)) => doc.get_object(*id).ok(),
            Ok(obj) => Some(obj),
            Err(_) => None,
        };
        if let Some(Object::String(bytes, _)) = value {
            let raw = decode_pdf_string(bytes);
            if let Some(ts) = parse_pdf_date(&raw) {
                return DocumentDate::Found(ts);
            }
            first_raw.get_or_insert(raw);
        }
    }

    match first_raw {
        Some(raw) => DocumentDate::Unparseable(raw),
        None => DocumentDate::Missing,
    }
}

/// PDF text strings are either PDFDocEncoding or UTF-16BE with a BOM.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

/// Parse either date form found in filings:
/// the compact `D:YYYYMMDDHHmmSS+HH'mm'` form (fields after the day are
/// optional) or the locale form `Fri 12 Oct 2018 05:53:59 PM +05:30`.
pub fn parse_pdf_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim().trim_end_matches('\0');
    parse_compact(raw).or_else(|| parse_locale(raw))
}

fn parse_compact(raw: &str) -> Option<DateTime<Utc>> {
    let body = raw.strip_prefix("D:").unwrap_or(raw);
    let digits: String = body.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() < 8 || digits.len() > 14 || digits.len() % 2 != 0 {
        return None;
    }

    let field = |from: usize, to: usize| -> Option<u32> {
        digits.get(from..to).and_then(|s| s.parse().ok())
    };
    let year: i32 = digits.get(0..4)?.parse().ok()?;
    let month = field(4, 6)?;
    let day = field(6, 8)?;
    let hour = field(8, 10).unwrap_or(0);
    let minute = field(10, 12).unwrap_or(0);
    let second = field(12, 14).unwrap_or(0);
    let naive = NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)?;

    let rest = &body[digits.len()..];
    let offset = parse_compact_offset(rest)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `""`, `"Z"`, `"Z00'00'"`, `"+05'30'"`, `"-0800"`, `"+05"`.
fn parse_compact_offset(rest: &str) -> Option<FixedOffset> {
    let rest = rest.trim();
    let sign = match rest.chars().next() {
        None | Some('Z') | Some('z') => return FixedOffset::east_opt(0),
        Some('+') => 1,
        Some('-') => -1,
        Some(_) => return None,
    };
    let digits: String = rest[1..].chars().filter(|c| c.is_ascii_digit()).collect();
    let hours: i32 = digits.get(0..2)?.parse().ok()?;
    let minutes: i32 = digits.get(2..4).and_then(|m| m.parse().ok()).unwrap_or(0);
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

fn parse_locale(raw: &str) -> Option<DateTime<Utc>> {
    const FORMATS: [&str; 2] = ["%a %d %b %Y %I:%M:%S %p %:z", "%a %d %b %Y %I:%M:%S %p %z"];
    FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
