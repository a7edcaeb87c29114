//! Retrieval-augmented answering.
//!
//! Per query: retrieve the top-k chunks, assemble a bounded context, ask
//! the model for the fixed JSON schema and validate the reply. Any
//! generation problem (no model, missing credential, call failure,
//! unparseable reply) produces the templated fallback over the same
//! chunks with `degraded = true`. Only index misuse and an empty question
//! are returned as errors.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::RetrievalConfig;
use crate::embedding::Embedder;
use crate::error::{HarnessError, HarnessResult};
use crate::fallback;
use crate::index::IndexHandle;
use crate::llm::LanguageModel;
use crate::models::{QueryAnswer, ScoredChunk};
use crate::prompt;

/// Model availability, decided once when the answerer is built.
pub enum Generator {
    Model(Box<dyn LanguageModel>),
    /// No model; the reason is reported in `limitations`.
    Unavailable(String),
}

pub struct Answerer {
    embedder: Arc<dyn Embedder>,
    generator: Generator,
    retrieval: RetrievalConfig,
}

impl Answerer {
    pub fn new(embedder: Arc<dyn Embedder>, generator: Generator, retrieval: RetrievalConfig) -> Self {
        Self {
            embedder,
            generator,
            retrieval,
        }
    }

    pub fn answer(&self, question: &str, index: &IndexHandle) -> HarnessResult<QueryAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(HarnessError::EmptyQuestion);
        }

        let index = match index {
            IndexHandle::Ready(index) if !index.is_empty() => index,
            _ => {
                info!("index is empty, answering with no data");
                return Ok(QueryAnswer {
                    question: question.to_string(),
                    grounding_chunks: Vec::new(),
                    structured_answer: fallback::no_data_answer(),
                    degraded: true,
                });
            }
        };

        let query = match self.embedder.embed_query(question) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "query embedding failed, degrading");
                let reason = format!("The question could not be embedded: {}.", e);
                return Ok(self.degraded(question, Vec::new(), &reason));
            }
        };
        let hits = index.search(&query, self.retrieval.top_k)?;
        debug!(hits = hits.len(), top_score = hits.first().map(|h| h.score), "retrieved");

        let model = match &self.generator {
            Generator::Model(model) => model,
            Generator::Unavailable(reason) => return Ok(self.degraded(question, hits, reason)),
        };

        let context = prompt::build_context(&hits, self.retrieval.max_context_chars);
        let reply = match model.complete(prompt::SYSTEM_PROMPT, &prompt::user_prompt(question, &context)) {
            Ok(reply) => reply,
            Err(e) => {
                warn!(model = model.name(), error = %format!("{:#}", e), "model call failed, degrading");
                let reason = format!("The language model call failed: {}.", e);
                return Ok(self.degraded(question, hits, &reason));
            }
        };

        match prompt::parse_answer(&reply) {
            Ok(structured_answer) => Ok(QueryAnswer {
                question: question.to_string(),
                grounding_chunks: hits,
                structured_answer,
                degraded: false,
            }),
            Err(e) => {
                warn!(model = model.name(), error = %e, "model reply rejected, degrading");
                let reason = format!("The language model reply was not valid: {}.", e);
                Ok(self.degraded(question, hits, &reason))
            }
        }
    }

    fn degraded(&self, question: &str, hits: Vec<ScoredChunk>, reason: &str) -> QueryAnswer {
        QueryAnswer {
            question: question.to_string(),
            structured_answer: fallback::degraded_answer(question, &hits, reason),
            grounding_chunks: hits,
            degraded: true,
        }
    }
}
