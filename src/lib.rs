//! # Filing Harness
//!
//! Retrieval-grounded analysis of a company's quarterly filings,
//! investor presentations and earnings-call transcripts.
//!
//! Documents are scraped from a company page, downloaded, classified and
//! aged out by their embedded PDF dates. Their text is chunked, embedded
//! and kept in a persisted vector index. Questions are answered by a
//! language model over the top-ranked chunks, with a deterministic
//! fallback whenever the model cannot be used.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ scrape       │──▶│ download     │──▶│ documents/  │
//! │ company page │   │ classify     │   │ *.pdf       │
//! └──────────────┘   │ retention    │   └──────┬──────┘
//!                    └──────────────┘          │ extract + chunk + embed
//!                                              ▼
//!      ┌──────────┐   ┌──────────────┐   ┌─────────────┐
//!      │  market  │   │ answer       │◀──│ index       │
//!      │  quote   │   │ llm/fallback │   │ (persisted) │
//!      └────┬─────┘   └──────┬───────┘   └─────────────┘
//!           └───── forecast ─┘
//!                     │
//!           ┌─────────┴─────────┐
//!           ▼                   ▼
//!      ┌──────────┐       ┌──────────┐
//!      │   CLI    │       │   HTTP   │
//!      │(filings) │       │  (axum)  │
//!      └──────────┘       └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | Typed errors |
//! | [`models`] | Core data types |
//! | [`scrape`] | Document link discovery |
//! | [`download`] | Link resolution, download and storage |
//! | [`classify`] | Document kind from leading-page text |
//! | [`retention`] | PDF date parsing and age-based deletion |
//! | [`extract`] | PDF text extraction with fallbacks |
//! | [`chunk`] | Overlapping character windows |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index, search and persistence |
//! | [`answer`] | Retrieval-augmented answering |
//! | [`market`] | Symbol resolution and live quotes |
//! | [`financials`] | Quarterly results table |
//! | [`pipeline`] | Operations exposed to front ends |
//! | [`server`] | HTTP server |

pub mod answer;
pub mod chunk;
pub mod classify;
pub mod config;
pub mod download;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod fallback;
pub mod financials;
pub mod http;
pub mod index;
pub mod llm;
pub mod market;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod prompt;
pub mod retention;
pub mod scrape;
pub mod server;
pub mod status;

#[cfg(test)]
mod test_pdf;
