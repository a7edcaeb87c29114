//! # Filing Harness CLI (`filings`)
//!
//! Acquires a company's quarterly documents, indexes them and answers
//! questions grounded in them.
//!
//! ## Usage
//!
//! ```bash
//! filings --config ./config/filings.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `filings acquire <company>` | Scrape, download and classify documents |
//! | `filings index <company>` | Load the index, merging or building as needed |
//! | `filings ask <company> "<question>"` | Grounded answer as JSON |
//! | `filings quote <company>` | Live price as JSON |
//! | `filings financials <company>` | Quarterly results table as JSON |
//! | `filings sweep` | Delete documents past the retention window |
//! | `filings status` | Stored documents and index state |
//! | `filings serve` | Start the HTTP server |
//!
//! Results go to stdout; logs and progress go to stderr.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use filing_harness::config::load_config;
use filing_harness::index::IndexHandle;
use filing_harness::pipeline::Harness;
use filing_harness::progress::ProgressMode;
use filing_harness::{server, status};

/// Filing Harness: retrieval-grounded analysis of quarterly filings,
/// presentations and earnings-call transcripts.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/filings.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "filings", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/filings.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Progress output on stderr: `human`, `json` or `off`.
    /// Defaults to `human` on a terminal and `off` otherwise.
    #[arg(long, global = true)]
    progress: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover, download and classify a company's documents.
    ///
    /// `<company>` is a ticker symbol or a full company page URL.
    Acquire {
        company: String,

        /// Delete every stored document before downloading.
        #[arg(long)]
        reset: bool,
    },

    /// Load the persisted index, merging newly stored documents.
    ///
    /// Without an index or any documents, documents are acquired first.
    Index {
        company: String,

        /// Re-extract and re-embed every stored document.
        #[arg(long)]
        rebuild: bool,
    },

    /// Answer a question from the indexed documents.
    Ask {
        company: String,
        question: String,

        /// Include the live market price in the output.
        #[arg(long)]
        with_quote: bool,
    },

    /// Fetch the live market price.
    Quote { company: String },

    /// Extract the quarterly results table from the company page.
    Financials { company: String },

    /// Delete documents older than the retention window.
    Sweep,

    /// Show stored documents and index state.
    Status,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let progress = match cli.progress.as_deref() {
        None => ProgressMode::default_for_tty(),
        Some("human") => ProgressMode::Human,
        Some("json") => ProgressMode::Json,
        Some("off") => ProgressMode::Off,
        Some(other) => anyhow::bail!("unknown progress mode '{}': use human, json or off", other),
    };

    let cfg = load_config(&cli.config)?;
    let harness = Harness::new(cfg)?.with_progress(progress.reporter());

    match cli.command {
        Commands::Acquire { company, reset } => {
            if reset {
                let removed = harness.purge_documents()?;
                eprintln!("Removed {} stored documents.", removed);
            }
            let summary = harness.discover_and_download(&company);
            print_json(&summary)?;
        }
        Commands::Index { company, rebuild } => {
            let handle = if rebuild {
                harness.rebuild_index()?
            } else {
                harness.build_or_load_index(&company)?
            };
            match handle {
                IndexHandle::Ready(index) => println!(
                    "Index ready: {} chunks ({}, {} dims).",
                    index.len(),
                    index.model(),
                    index.dims()
                ),
                IndexHandle::Empty => println!("Index is empty: no extractable text in stored documents."),
            }
        }
        Commands::Ask {
            company,
            question,
            with_quote,
        } => {
            let handle = harness.build_or_load_index(&company)?;
            if with_quote {
                print_json(&harness.forecast(&company, &question, &handle)?)?;
            } else {
                print_json(&harness.answer(&question, &handle)?)?;
            }
        }
        Commands::Quote { company } => {
            print_json(&harness.quote(&company))?;
        }
        Commands::Financials { company } => {
            print_json(&harness.financials(&company))?;
        }
        Commands::Sweep => {
            let report = harness.sweep()?;
            print_json(&report)?;
        }
        Commands::Status => {
            let report = status::status(harness.config(), harness.embedder())?;
            print_json(&report)?;
        }
        Commands::Serve => {
            let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
            runtime.block_on(server::run_server(harness))?;
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
