//! Quarterly results table scraped from the company page.

use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use tracing::warn;

use crate::config::AcquireConfig;
use crate::http;
use crate::scrape::company_url;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QuarterlyTable {
    /// Column headers, e.g. `["Jun 2024", "Sep 2024"]`.
    pub periods: Vec<String>,
    pub rows: Vec<MetricRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    pub metric: String,
    /// One value per period; `None` where the cell is blank or a dash.
    pub values: Vec<Option<f64>>,
}

impl QuarterlyTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn metric(&self, name: &str) -> Option<&MetricRow> {
        self.rows
            .iter()
            .find(|r| r.metric.eq_ignore_ascii_case(name))
    }
}

/// `"1,234.56"`, `"5.2%"`, `"12.3 Cr"` → number; `"-"`, `"N/A"`, `""` → `None`.
pub fn parse_financial_value(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .replace("Cr.", "")
        .replace("Cr", "")
        .chars()
        .filter(|c| !matches!(c, ',' | '%' | '₹') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() || cleaned == "-" || cleaned.eq_ignore_ascii_case("n/a") {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Fetch the company page and read its quarterly table. Any failure is
/// logged and yields an empty table.
pub fn fetch_quarterly_table(config: &AcquireConfig, identifier: &str) -> QuarterlyTable {
    let url = match company_url(&config.base_url, identifier) {
        Ok(url) => url,
        Err(e) => {
            warn!(company = identifier, error = %e, "cannot build company url");
            return QuarterlyTable::default();
        }
    };
    let page = http::client(&config.user_agent, config.timeout_secs)
        .and_then(|client| http::get_text(&client, url.as_str()));
    match page {
        Ok(html) => {
            let table = extract_quarterly_table(&html);
            if table.is_empty() {
                warn!(company = identifier, "no quarterly results section on page");
            }
            table
        }
        Err(e) => {
            warn!(company = identifier, error = %format!("{:#}", e), "company page unreachable");
            QuarterlyTable::default()
        }
    }
}

pub fn extract_quarterly_table(html: &str) -> QuarterlyTable {
    let document = Html::parse_document(html);
    let (Ok(table_sel), Ok(row_sel), Ok(th_sel), Ok(td_sel)) = (
        Selector::parse("section#quarters table"),
        Selector::parse("tr"),
        Selector::parse("th"),
        Selector::parse("td"),
    ) else {
        return QuarterlyTable::default();
    };

    let Some(table) = document.select(&table_sel).next() else {
        return QuarterlyTable::default();
    };

    let mut periods = Vec::new();
    let mut rows = Vec::new();
    for row in table.select(&row_sel) {
        let headers: Vec<String> = row.select(&th_sel).map(cell_text).collect();
        let cells: Vec<String> = row.select(&td_sel).map(cell_text).collect();

        if cells.is_empty() {
            if periods.is_empty() && headers.len() > 1 {
                // First header cell labels the metric column.
                periods = headers[1..].to_vec();
            }
            continue;
        }

        let metric = cells[0].trim_end_matches('+').trim().to_string();
        if metric.is_empty() {
            continue;
        }
        rows.push(MetricRow {
            metric,
            values: cells[1..].iter().map(|c| parse_financial_value(c)).collect(),
        });
    }

    QuarterlyTable { periods, rows }
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
