//! Document download, naming and de-duplication.
//!
//! Links come in three shapes, told apart by configured URL markers:
//!
//! | Shape | Marker (default) | Handling |
//! |-------|------------------|----------|
//! | Gateway | `AnnPdfOpen.aspx` | GET; the response body is the document |
//! | Viewer | `xml-data/corpfiling` | GET the wrapper page, follow its embedded frame |
//! | Direct | anything else | GET and save verbatim |
//!
//! Every failure is logged and reported as `None`; one bad link never
//! stops the batch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::Client;
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use url::Url;

use crate::classify;
use crate::config::AcquireConfig;
use crate::http;
use crate::models::{DocumentLink, DownloadedDocument};
use crate::retention;

/// Longest file name written, in characters, extension included.
pub const MAX_FILENAME_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkShape {
    Direct,
    Viewer,
    Gateway,
}

impl LinkShape {
    pub fn of(url: &str, config: &AcquireConfig) -> LinkShape {
        if config.gateway_markers.iter().any(|m| url.contains(m.as_str())) {
            LinkShape::Gateway
        } else if config.viewer_markers.iter().any(|m| url.contains(m.as_str())) {
            LinkShape::Viewer
        } else {
            LinkShape::Direct
        }
    }
}

/// Result of one download attempt.
#[derive(Debug)]
pub enum DownloadOutcome {
    Saved(DownloadedDocument),
    /// Byte-identical to a document already stored.
    AlreadyPresent(PathBuf),
    Failed(String),
}

/// Downloads documents into one directory, remembering the content hash and
/// path of everything already stored there.
pub struct Downloader {
    config: AcquireConfig,
    dir: PathBuf,
    known: HashMap<String, PathBuf>,
}

impl Downloader {
    pub fn new(config: &AcquireConfig, dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create documents dir {}", dir.display()))?;

        let mut known = HashMap::new();
        for path in stored_documents(dir)? {
            match std::fs::read(&path) {
                Ok(bytes) => {
                    known.insert(bytes_hash(&bytes), path);
                }
                Err(e) => debug!(path = %path.display(), error = %e, "cannot hash stored document"),
            }
        }

        Ok(Self {
            config: config.clone(),
            dir: dir.to_path_buf(),
            known,
        })
    }

    /// Download, save, classify and date one link. `None` on any failure
    /// or when the same bytes are already stored.
    pub fn download(&mut self, link: &DocumentLink) -> Option<DownloadedDocument> {
        match self.attempt(link) {
            DownloadOutcome::Saved(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn attempt(&mut self, link: &DocumentLink) -> DownloadOutcome {
        let shape = LinkShape::of(&link.source_url, &self.config);
        let bytes = match self.fetch(&link.source_url, shape) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(url = %link.source_url, ?shape, error = %format!("{:#}", e), "download failed");
                return DownloadOutcome::Failed(e.to_string());
            }
        };

        let hash = bytes_hash(&bytes);
        if let Some(stored) = self.known.get(&hash) {
            info!(url = %link.source_url, stored = %stored.display(), "identical document already stored, skipping");
            return DownloadOutcome::AlreadyPresent(stored.clone());
        }

        let name = sanitize_filename(&link.suggested_filename);
        let path = unique_path(&self.dir, &name);
        if let Err(e) = std::fs::write(&path, &bytes) {
            warn!(path = %path.display(), error = %e, "cannot write document");
            return DownloadOutcome::Failed(e.to_string());
        }
        let (local_path, classified_kind) = match classify::apply(&path) {
            Ok(result) => result,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "classification rename failed");
                (path, crate::models::DocumentKind::Unclassified)
            }
        };

        self.known.insert(hash, local_path.clone());

        let creation_timestamp = retention::document_date(&local_path).timestamp();
        info!(
            path = %local_path.display(),
            kind = %classified_kind,
            bytes = bytes.len(),
            "saved document"
        );
        DownloadOutcome::Saved(DownloadedDocument {
            local_path,
            origin_url: link.source_url.clone(),
            classified_kind,
            creation_timestamp,
        })
    }

    fn fetch(&self, url: &str, shape: LinkShape) -> Result<Vec<u8>> {
        let client = http::client(&self.config.user_agent, self.config.timeout_secs)?;
        let bytes = match shape {
            LinkShape::Direct => http::get_bytes(&client, url)?,
            LinkShape::Viewer => self.follow_viewer(&client, url)?,
            LinkShape::Gateway => {
                let body = http::get_bytes(&client, url)?;
                if looks_like_pdf(&body) {
                    body
                } else {
                    // Some gateways answer with a viewer page instead.
                    let html = String::from_utf8_lossy(&body);
                    let target = embedded_frame_url(&html, url)?;
                    http::get_bytes(&client, target.as_str())?
                }
            }
        };

        if !looks_like_pdf(&bytes) {
            bail!("response from {} is not a PDF document", url);
        }
        Ok(bytes)
    }

    fn follow_viewer(&self, client: &Client, url: &str) -> Result<Vec<u8>> {
        let wrapper = http::get_text(client, url)?;
        let target = embedded_frame_url(&wrapper, url)?;
        debug!(wrapper = url, target = %target, "resolved viewer frame");
        http::get_bytes(client, target.as_str())
    }
}

/// Absolute URL of the first embedded content frame in a wrapper page.
pub fn embedded_frame_url(html: &str, base: &str) -> Result<Url> {
    let base = Url::parse(base).with_context(|| format!("invalid wrapper url {}", base))?;
    let document = Html::parse_document(html);

    for (selector, attr) in [("iframe[src]", "src"), ("embed[src]", "src"), ("object[data]", "data")] {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        if let Some(src) = document
            .select(&selector)
            .filter_map(|el| el.value().attr(attr))
            .map(str::trim)
            .find(|src| !src.is_empty())
        {
            return base
                .join(src)
                .with_context(|| format!("cannot resolve frame source {}", src));
        }
    }
    Err(anyhow!("wrapper page {} has no embedded document frame", base))
}

fn looks_like_pdf(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    bytes[start..].starts_with(b"%PDF")
}

fn bytes_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Make a file name safe on common filesystems.
///
/// Illegal characters and whitespace become `_`, runs of `_` collapse,
/// leading/trailing dots, spaces and underscores are stripped, a `.pdf`
/// extension is ensured and the result is capped at
/// [`MAX_FILENAME_CHARS`] with the extension kept.
pub fn sanitize_filename(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | ';' | ',')
            || c.is_control()
            || c.is_whitespace()
        {
            '_'
        } else {
            c
        };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }

    let trimmed = out.trim_matches(|c: char| c == '.' || c == ' ' || c == '_');
    let mut name = if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    };

    let (stem, ext) = match name.rfind('.') {
        Some(i) if name[i..].eq_ignore_ascii_case(".pdf") => {
            (name[..i].to_string(), name[i..].to_string())
        }
        _ => (name.clone(), ".pdf".to_string()),
    };
    let stem = stem.trim_end_matches(['.', '_']);
    let stem = if stem.is_empty() { "document" } else { stem };

    let budget = MAX_FILENAME_CHARS.saturating_sub(ext.chars().count());
    name = stem.chars().take(budget).collect();
    name.push_str(&ext);
    name
}

/// `dir/name`, or `dir/stem_N.ext` with the smallest `N` not yet taken.
pub fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match name.rfind('.') {
        Some(i) if i > 0 => (&name[..i], &name[i..]),
        _ => (name, ""),
    };
    let mut counter = 1usize;
    loop {
        let candidate = dir.join(format!("{}_{}{}", stem, counter, ext));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

/// PDF files currently in `dir`, sorted by name.
pub fn stored_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut paths: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Delete every stored document. Returns how many were removed.
pub fn purge_documents(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for path in stored_documents(dir)? {
        std::fs::remove_file(&path)
            .with_context(|| format!("cannot remove {}", path.display()))?;
        removed += 1;
    }
    info!(dir = %dir.display(), removed, "purged documents");
    Ok(removed)
}
