//! The operations front ends call.
//!
//! [`Harness`] owns the configuration, the embedder and the quote source.
//! The index is never stored here: [`Harness::build_or_load_index`]
//! returns an [`IndexHandle`] that callers pass back into
//! [`Harness::answer`], so there is no ambient mutable index.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::answer::{Answerer, Generator};
use crate::chunk::chunk_text;
use crate::config::Config;
use crate::download::{purge_documents, stored_documents, DownloadOutcome, Downloader};
use crate::embedding::{create_embedder, Embedder};
use crate::error::{HarnessError, HarnessResult, IndexLoadError};
use crate::extract::extract_text;
use crate::financials::{fetch_quarterly_table, QuarterlyTable};
use crate::index::{IndexHandle, VectorIndex};
use crate::llm::create_model;
use crate::market::{error_quote, resolve_symbol, QuoteSource, YahooQuoteSource};
use crate::models::{AcquisitionSummary, ForecastReport, MarketQuote, QueryAnswer, TextChunk};
use crate::progress::{NoProgress, ProgressEvent, ProgressReporter};
use crate::retention::{self, SweepReport};
use crate::scrape::discover_links;

pub struct Harness {
    config: Config,
    embedder: Arc<dyn Embedder>,
    quotes: Box<dyn QuoteSource>,
    progress: Box<dyn ProgressReporter>,
}

impl Harness {
    /// Validate `config` and build the configured embedder.
    pub fn new(config: Config) -> HarnessResult<Self> {
        config.validate()?;
        let embedder: Arc<dyn Embedder> = Arc::from(create_embedder(&config.embedding)?);
        Ok(Self::with_embedder(config, embedder))
    }

    pub fn with_embedder(config: Config, embedder: Arc<dyn Embedder>) -> Self {
        let quotes = Box::new(YahooQuoteSource::new(&config.market));
        Self {
            config,
            embedder,
            quotes,
            progress: Box::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    /// Scrape, download up to `max_documents` links, then sweep expired
    /// documents. Never fails: every problem is logged and counted.
    pub fn discover_and_download(&self, company: &str) -> AcquisitionSummary {
        let mut summary = AcquisitionSummary::default();
        let acquire = &self.config.acquire;

        self.progress.report(ProgressEvent::Discovering {
            company: company.to_string(),
        });
        let links = match discover_links(acquire, company) {
            Ok(links) => links,
            Err(e) => {
                warn!(company, error = %e, "no documents discovered");
                Vec::new()
            }
        };
        summary.discovered = links.len();

        let documents_dir = self.config.storage.documents_dir();
        match Downloader::new(acquire, &documents_dir) {
            Ok(mut downloader) => {
                let batch = links.len().min(acquire.max_documents);
                summary.skipped += links.len() - batch;
                for (i, link) in links.iter().take(batch).enumerate() {
                    self.progress.report(ProgressEvent::Downloading {
                        company: company.to_string(),
                        n: i as u64 + 1,
                        total: batch as u64,
                    });
                    match downloader.attempt(link) {
                        DownloadOutcome::Saved(_) => summary.downloaded += 1,
                        DownloadOutcome::AlreadyPresent(_) => summary.skipped += 1,
                        DownloadOutcome::Failed(_) => summary.failed += 1,
                    }
                }
            }
            Err(e) => {
                warn!(error = %format!("{:#}", e), "documents directory unavailable");
                summary.failed += links.len();
            }
        }

        match self.sweep() {
            Ok(report) => summary.deleted = report.deleted,
            Err(e) => warn!(error = %format!("{:#}", e), "retention sweep failed"),
        }

        info!(
            company,
            discovered = summary.discovered,
            downloaded = summary.downloaded,
            skipped = summary.skipped,
            failed = summary.failed,
            deleted = summary.deleted,
            "acquisition finished"
        );
        summary
    }

    /// Load the persisted index, acquiring documents first when there is
    /// neither an index nor any stored document. Chunks of documents no
    /// longer stored are dropped, documents stored since the index was
    /// built are merged in, and the result persisted.
    pub fn build_or_load_index(&self, company: &str) -> HarnessResult<IndexHandle> {
        let index_dir = self.config.storage.index_dir();
        match VectorIndex::load(&index_dir, self.embedder.as_ref()) {
            Ok(mut index) => {
                info!(path = %index_dir.display(), entries = index.len(), "loaded index");
                let stored = self.stored_document_ids()?;
                let dropped = index.retain_sources(&stored);
                if dropped > 0 {
                    info!(dropped, "removed chunks of deleted documents from index");
                    if index.is_empty() {
                        return self.rebuild_index();
                    }
                    index.persist(&index_dir)?;
                }
                self.merge_new_documents(index)
            }
            Err(IndexLoadError::NotFound(_)) => {
                let documents_dir = self.config.storage.documents_dir();
                if stored_documents(&documents_dir)?.is_empty() {
                    self.discover_and_download(company);
                }
                self.rebuild_index()
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Re-extract, re-chunk and re-embed every stored document.
    pub fn rebuild_index(&self) -> HarnessResult<IndexHandle> {
        let chunks = self.chunk_documents(&HashSet::new())?;
        self.progress.report(ProgressEvent::Embedding {
            chunks: chunks.len() as u64,
        });
        let handle = VectorIndex::build(
            self.embedder.as_ref(),
            chunks,
            self.config.embedding.batch_size,
        )?;

        let index_dir = self.config.storage.index_dir();
        match &handle {
            IndexHandle::Ready(index) => index.persist(&index_dir)?,
            IndexHandle::Empty => {
                if index_dir.exists() {
                    std::fs::remove_dir_all(&index_dir)?;
                }
                warn!("no text in stored documents; index is empty");
            }
        }
        Ok(handle)
    }

    fn merge_new_documents(&self, index: VectorIndex) -> HarnessResult<IndexHandle> {
        let indexed: HashSet<String> = index
            .entries()
            .iter()
            .map(|e| e.chunk.source_document_id.clone())
            .collect();
        let fresh = self.chunk_documents(&indexed)?;
        if fresh.is_empty() {
            return Ok(IndexHandle::Ready(Arc::new(index)));
        }

        self.progress.report(ProgressEvent::Embedding {
            chunks: fresh.len() as u64,
        });
        let before = index.len();
        let merged = index.merge(
            self.embedder.as_ref(),
            fresh,
            self.config.embedding.batch_size,
        )?;
        if merged.len() > before {
            merged.persist(&self.config.storage.index_dir())?;
            info!(added = merged.len() - before, "merged new documents into index");
        }
        Ok(IndexHandle::Ready(Arc::new(merged)))
    }

    fn stored_document_ids(&self) -> HarnessResult<HashSet<String>> {
        Ok(stored_documents(&self.config.storage.documents_dir())?
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect())
    }

    /// Chunks of every stored document whose file name is not in `skip`.
    fn chunk_documents(&self, skip: &HashSet<String>) -> HarnessResult<Vec<TextChunk>> {
        let chunking = &self.config.chunking;
        chunking.validate()?;

        let paths: Vec<_> = stored_documents(&self.config.storage.documents_dir())?
            .into_iter()
            .filter(|p| {
                p.file_name()
                    .map(|n| !skip.contains(n.to_string_lossy().as_ref()))
                    .unwrap_or(false)
            })
            .collect();

        let mut chunks = Vec::new();
        for (i, path) in paths.iter().enumerate() {
            self.progress.report(ProgressEvent::Extracting {
                n: i as u64 + 1,
                total: paths.len() as u64,
            });
            let doc_id = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let text = extract_text(path);
            let mut doc_chunks = chunk_text(&doc_id, &text, chunking.chunk_size, chunking.overlap)?;
            info!(document = %doc_id, chunks = doc_chunks.len(), "chunked document");
            chunks.append(&mut doc_chunks);
        }
        Ok(chunks)
    }

    /// Answerer for the configured model. A disabled model or a missing
    /// credential yields degraded answers rather than an error.
    pub fn answerer(&self) -> Answerer {
        let generator = match create_model(&self.config.llm) {
            Ok(Some(model)) => Generator::Model(model),
            Ok(None) => Generator::Unavailable("The language model is disabled in configuration.".into()),
            Err(e) => {
                warn!(error = %e, "language model unavailable");
                Generator::Unavailable(format!("{}.", e))
            }
        };
        Answerer::new(self.embedder.clone(), generator, self.config.retrieval.clone())
    }

    pub fn answer(&self, question: &str, index: &IndexHandle) -> HarnessResult<QueryAnswer> {
        self.answerer().answer(question, index)
    }

    pub fn quote(&self, company: &str) -> MarketQuote {
        match resolve_symbol(company) {
            Ok(symbol) => self.quotes.get_quote(&symbol),
            Err(e) => {
                warn!(company, error = %e, "cannot resolve symbol");
                error_quote(company, e.to_string())
            }
        }
    }

    /// Answer plus live price for one company.
    pub fn forecast(
        &self,
        company: &str,
        question: &str,
        index: &IndexHandle,
    ) -> HarnessResult<ForecastReport> {
        let answer = self.answer(question, index)?;
        let market = self.quote(company);
        Ok(ForecastReport {
            company: company.to_string(),
            answer,
            market,
        })
    }

    pub fn financials(&self, company: &str) -> QuarterlyTable {
        fetch_quarterly_table(&self.config.acquire, company)
    }

    pub fn sweep(&self) -> anyhow::Result<SweepReport> {
        retention::sweep(
            &self.config.storage.documents_dir(),
            self.config.acquire.retention_days,
        )
    }

    pub fn purge_documents(&self) -> HarnessResult<usize> {
        purge_documents(&self.config.storage.documents_dir()).map_err(HarnessError::from)
    }
}
