//! Error taxonomy for the filing pipeline.
//!
//! Only configuration and index errors are meant to reach an operator.
//! Acquisition problems are logged and counted, generation problems turn
//! into a degraded answer, and quote problems become a [`QuoteStatus`].
//!
//! [`QuoteStatus`]: crate::models::QuoteStatus

use std::path::PathBuf;

use thiserror::Error;

/// Invalid or incomplete configuration, detected at the point of use.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("chunking.overlap ({overlap}) must be smaller than chunking.chunk_size ({size}) and chunk_size must be > 0")]
    InvalidChunking { size: usize, overlap: usize },

    #[error("{provider} credential missing: environment variable {env_var} is not set")]
    MissingCredential { provider: String, env_var: String },

    #[error("{0}")]
    Invalid(String),
}

/// The company page could not be scraped.
///
/// Callers treat this as "zero documents", not as a hard failure.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid company url {0}")]
    InvalidUrl(String),

    #[error("company page {url} unreachable: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("company page {url} has no documents section")]
    StructureMissing { url: String },
}

/// A persisted index could not be loaded.
#[derive(Debug, Error)]
pub enum IndexLoadError {
    #[error("no persisted index at {0}")]
    NotFound(PathBuf),

    #[error("persisted index at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error(
        "persisted index was built with {found_model} ({found_dims} dims) but the configured embedder is {expected_model} ({expected_dims} dims); rebuild the index"
    )]
    Incompatible {
        expected_model: String,
        expected_dims: usize,
        found_model: String,
        found_dims: usize,
    },

    #[error("index io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Misuse of an in-memory index.
#[derive(Debug, Error, PartialEq)]
pub enum IndexError {
    #[error("index is empty; acquire documents and rebuild before querying")]
    Empty,

    #[error("vector has {found} dims but the index holds {expected}-dim vectors")]
    DimensionMismatch { expected: usize, found: usize },
}

/// A company identifier did not follow the `/company/<SYMBOL>/` convention.
#[derive(Debug, Error, PartialEq)]
#[error("cannot parse a ticker symbol from {0:?}")]
pub struct SymbolParseError(pub String);

/// Errors surfaced by the exposed pipeline operations.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    IndexLoad(#[from] IndexLoadError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type HarnessResult<T> = Result<T, HarnessError>;
