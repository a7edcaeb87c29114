//! Document link discovery on a company page.
//!
//! The page lists filings in a documents section. Several selectors are
//! tried in order because the markup differs between layouts; the first
//! one that yields document links wins.

use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::AcquireConfig;
use crate::error::ScrapeError;
use crate::http;
use crate::models::DocumentLink;

/// Anchor selectors, most specific first.
const LINK_SELECTORS: [&str; 3] = [".documents a", "#documents a", "a[href$='.pdf']"];
/// A page carrying one of these has a documents section, even if it is empty.
const CONTAINER_SELECTOR: &str = ".documents, #documents";

/// URL of the company page for `identifier`.
///
/// A full `http(s)` URL is used as-is; anything else is treated as a ticker
/// under `{base_url}/company/{SYMBOL}/consolidated/`.
pub fn company_url(base_url: &str, identifier: &str) -> Result<Url, ScrapeError> {
    let identifier = identifier.trim();
    if identifier.starts_with("http://") || identifier.starts_with("https://") {
        return Url::parse(identifier).map_err(|_| ScrapeError::InvalidUrl(identifier.to_string()));
    }
    if identifier.is_empty() || identifier.contains('/') {
        return Err(ScrapeError::InvalidUrl(identifier.to_string()));
    }
    let raw = format!(
        "{}/company/{}/consolidated/",
        base_url.trim_end_matches('/'),
        identifier.to_uppercase()
    );
    Url::parse(&raw).map_err(|_| ScrapeError::InvalidUrl(raw))
}

/// Fetch the company page and list its document links in page order,
/// deduplicated by URL.
pub fn discover_links(
    config: &AcquireConfig,
    identifier: &str,
) -> Result<Vec<DocumentLink>, ScrapeError> {
    let page_url = company_url(&config.base_url, identifier)?;
    let client = http::client(&config.user_agent, config.timeout_secs).map_err(|e| {
        ScrapeError::Unreachable {
            url: page_url.to_string(),
            reason: e.to_string(),
        }
    })?;
    let body = http::get_text(&client, page_url.as_str()).map_err(|e| ScrapeError::Unreachable {
        url: page_url.to_string(),
        reason: format!("{:#}", e),
    })?;

    let links = parse_links(&body, &page_url, config)?;
    info!(company = identifier, url = %page_url, links = links.len(), "discovered document links");
    Ok(links)
}

/// Extract document links from an already fetched page.
pub fn parse_links(
    html: &str,
    page_url: &Url,
    config: &AcquireConfig,
) -> Result<Vec<DocumentLink>, ScrapeError> {
    let document = Html::parse_document(html);

    let mut links: Vec<DocumentLink> = Vec::new();
    for raw_selector in LINK_SELECTORS {
        let Ok(selector) = Selector::parse(raw_selector) else {
            continue;
        };
        for anchor in document.select(&selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if !is_document_href(href, config) {
                continue;
            }
            let Ok(resolved) = page_url.join(href.trim()) else {
                warn!(href, "skipping unresolvable link");
                continue;
            };
            let source_url = resolved.to_string();
            if links.iter().any(|l| l.source_url == source_url) {
                continue;
            }
            let text: String = anchor.text().collect();
            links.push(DocumentLink {
                suggested_filename: filename_from_anchor(&text, &resolved),
                source_url,
                discovered_kind: None,
            });
        }
        if !links.is_empty() {
            debug!(selector = raw_selector, count = links.len(), "selector matched");
            break;
        }
    }

    if links.is_empty() && !has_documents_section(&document) {
        return Err(ScrapeError::StructureMissing {
            url: page_url.to_string(),
        });
    }
    Ok(links)
}

fn has_documents_section(document: &Html) -> bool {
    Selector::parse(CONTAINER_SELECTOR)
        .map(|s| document.select(&s).next().is_some())
        .unwrap_or(false)
}

fn is_document_href(href: &str, config: &AcquireConfig) -> bool {
    let lower = href.to_ascii_lowercase();
    lower.contains(".pdf")
        || href.contains("AnnPdf")
        || config
            .viewer_markers
            .iter()
            .chain(config.gateway_markers.iter())
            .any(|m| href.contains(m.as_str()))
}

/// File name suggested by the anchor text, or the URL's last segment when
/// the anchor has no text.
fn filename_from_anchor(text: &str, url: &Url) -> String {
    let mut name: String = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if name.trim_matches('_').is_empty() {
        name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back().map(str::to_string))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Document".to_string());
    }
    if !name.to_ascii_lowercase().ends_with(".pdf") {
        name.push_str(".pdf");
    }
    name
}
