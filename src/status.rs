//! Summary of what is stored on disk.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::config::Config;
use crate::download::stored_documents;
use crate::embedding::Embedder;
use crate::error::IndexLoadError;
use crate::index::VectorIndex;
use crate::models::DocumentKind;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub documents_dir: PathBuf,
    pub total_documents: usize,
    /// Counts keyed by kind, inferred from the `{kind}_` file name prefix.
    pub documents_by_kind: BTreeMap<String, usize>,
    pub index: IndexStatus,
}

#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IndexStatus {
    Missing,
    Ready {
        path: PathBuf,
        model: String,
        dims: usize,
        entries: usize,
        documents: usize,
    },
    Unusable {
        path: PathBuf,
        reason: String,
    },
}

pub fn status(config: &Config, embedder: &dyn Embedder) -> anyhow::Result<StatusReport> {
    let documents_dir = config.storage.documents_dir();
    let documents = stored_documents(&documents_dir)?;

    let mut documents_by_kind = BTreeMap::new();
    for path in &documents {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        *documents_by_kind
            .entry(DocumentKind::from_file_name(&name).as_str().to_string())
            .or_insert(0) += 1;
    }

    let index_dir = config.storage.index_dir();
    let index = match VectorIndex::load(&index_dir, embedder) {
        Ok(index) => {
            let mut sources: Vec<&str> = index
                .entries()
                .iter()
                .map(|e| e.chunk.source_document_id.as_str())
                .collect();
            sources.sort_unstable();
            sources.dedup();
            IndexStatus::Ready {
                path: index_dir,
                model: index.model().to_string(),
                dims: index.dims(),
                entries: index.len(),
                documents: sources.len(),
            }
        }
        Err(IndexLoadError::NotFound(_)) => IndexStatus::Missing,
        Err(e) => IndexStatus::Unusable {
            path: index_dir,
            reason: e.to_string(),
        },
    };

    Ok(StatusReport {
        documents_dir,
        total_documents: documents.len(),
        documents_by_kind,
        index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;

    #[test]
    fn counts_documents_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::minimal(dir.path());
        let docs = config.storage.documents_dir();
        std::fs::create_dir_all(&docs).unwrap();
        for name in ["transcript_a.pdf", "transcript_b.pdf", "presentation_c.pdf", "misc.pdf"] {
            std::fs::write(docs.join(name), b"%PDF").unwrap();
        }

        let report = status(&config, &HashEmbedder::default()).unwrap();
        assert_eq!(report.total_documents, 4);
        assert_eq!(report.documents_by_kind["transcript"], 2);
        assert_eq!(report.documents_by_kind["presentation"], 1);
        assert_eq!(report.documents_by_kind["unclassified"], 1);
        assert!(matches!(report.index, IndexStatus::Missing));
    }
}
