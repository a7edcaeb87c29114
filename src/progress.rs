//! Acquisition and indexing progress reporting.
//!
//! Long batch runs (downloading a company's filings, embedding every chunk)
//! report what they are doing so an operator sees how much is left.
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    /// Fetching the company page. Total unknown.
    Discovering { company: String },
    /// Downloading link `n` of `total`.
    Downloading { company: String, n: u64, total: u64 },
    /// Extracting and chunking document `n` of `total`.
    Extracting { n: u64, total: u64 },
    /// Embedding `chunks` chunks into the index.
    Embedding { chunks: u64 },
}

/// Reports progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "acquire TCS  downloading  3 / 10 documents".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Discovering { company } => {
                format!("acquire {}  discovering...\n", company)
            }
            ProgressEvent::Downloading { company, n, total } => format!(
                "acquire {}  downloading  {} / {} documents\n",
                company,
                format_number(*n),
                format_number(*total)
            ),
            ProgressEvent::Extracting { n, total } => format!(
                "index  extracting  {} / {} documents\n",
                format_number(*n),
                format_number(*total)
            ),
            ProgressEvent::Embedding { chunks } => {
                format!("index  embedding  {} chunks\n", format_number(*chunks))
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Discovering { company } => serde_json::json!({
                "event": "progress",
                "company": company,
                "phase": "discovering"
            }),
            ProgressEvent::Downloading { company, n, total } => serde_json::json!({
                "event": "progress",
                "company": company,
                "phase": "downloading",
                "n": n,
                "total": total
            }),
            ProgressEvent::Extracting { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "extracting",
                "n": n,
                "total": total
            }),
            ProgressEvent::Embedding { chunks } => serde_json::json!({
                "event": "progress",
                "phase": "embedding",
                "chunks": chunks
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
