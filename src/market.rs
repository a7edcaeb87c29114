//! Live market price lookup.
//!
//! Independent of the retrieval path: a quote is fetched fresh for every
//! request and never cached. Nothing here fails outward; network trouble
//! becomes [`QuoteStatus::Error`] and an empty response becomes
//! [`QuoteStatus::NoData`].

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::MarketConfig;
use crate::error::SymbolParseError;
use crate::http;
use crate::models::{MarketQuote, QuoteStatus};

const USER_AGENT: &str = concat!("filing-harness/", env!("CARGO_PKG_VERSION"));

fn company_path() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/company/([^/?#]+)/").expect("static regex"))
}

fn bare_symbol() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9&.\-]+$").expect("static regex"))
}

/// Ticker symbol for a company identifier.
///
/// URLs must carry the symbol between `/company/` and the next `/`. A bare
/// token (letters, digits, `&`, `.`, `-`) is taken as the symbol itself.
pub fn resolve_symbol(identifier: &str) -> Result<String, SymbolParseError> {
    let trimmed = identifier.trim();
    if trimmed.contains('/') {
        return company_path()
            .captures(trimmed)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_uppercase())
            .ok_or_else(|| SymbolParseError(identifier.to_string()));
    }
    if bare_symbol().is_match(trimmed) {
        return Ok(trimmed.to_uppercase());
    }
    Err(SymbolParseError(identifier.to_string()))
}

/// A live quote provider keyed by ticker symbol.
pub trait QuoteSource: Send + Sync {
    fn get_quote(&self, symbol: &str) -> MarketQuote;
}

/// Yahoo Finance chart API (`/v8/finance/chart/{symbol}`).
pub struct YahooQuoteSource {
    config: MarketConfig,
}

#[derive(Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    regular_market_time: Option<i64>,
}

impl YahooQuoteSource {
    pub fn new(config: &MarketConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn quote_url(&self, symbol: &str) -> String {
        format!(
            "{}/v8/finance/chart/{}{}?interval=1d&range=1d",
            self.config.base_url.trim_end_matches('/'),
            symbol,
            self.config.symbol_suffix
        )
    }
}

impl QuoteSource for YahooQuoteSource {
    fn get_quote(&self, symbol: &str) -> MarketQuote {
        let url = self.quote_url(symbol);
        let reply = http::client(USER_AGENT, self.config.timeout_secs)
            .and_then(|client| http::get_text_with_status(&client, &url));
        let (status, body) = match reply {
            Ok(reply) => reply,
            Err(e) => {
                warn!(symbol, error = %format!("{:#}", e), "quote request failed");
                return error_quote(symbol, format!("{:#}", e));
            }
        };

        // Unknown tickers come back as 404 with a regular chart body.
        match serde_json::from_str::<ChartResponse>(&body) {
            Ok(parsed) => quote_from_chart(symbol, parsed),
            Err(_) if !status.is_success() => {
                warn!(symbol, %status, "quote request rejected");
                error_quote(symbol, format!("GET {} returned {}", url, status))
            }
            Err(e) => {
                warn!(symbol, error = %e, "malformed quote response");
                error_quote(symbol, format!("malformed quote response: {}", e))
            }
        }
    }
}

fn quote_from_chart(symbol: &str, response: ChartResponse) -> MarketQuote {
    if let Some(err) = response.chart.error.filter(|e| !e.is_null()) {
        debug!(symbol, error = %err, "quote source reported an error");
    }
    let meta = response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .map(|r| r.meta);

    match meta {
        Some(ChartMeta {
            regular_market_price: Some(price),
            regular_market_time,
        }) if price.is_finite() => MarketQuote {
            symbol: symbol.to_string(),
            price: Some(price),
            timestamp: regular_market_time
                .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
                .unwrap_or_else(Utc::now),
            status: QuoteStatus::Ok,
            message: None,
        },
        _ => MarketQuote {
            symbol: symbol.to_string(),
            price: None,
            timestamp: Utc::now(),
            status: QuoteStatus::NoData,
            message: Some("quote source returned no price".to_string()),
        },
    }
}

pub fn error_quote(symbol: &str, message: String) -> MarketQuote {
    MarketQuote {
        symbol: symbol.to_string(),
        price: None,
        timestamp: Utc::now(),
        status: QuoteStatus::Error,
        message: Some(message),
    }
}
