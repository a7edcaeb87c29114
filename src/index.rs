//! In-memory similarity index over embedded chunks, with on-disk persistence.
//!
//! An index is an ordered list of `(chunk, vector)` entries plus the model
//! name and dimensionality that produced the vectors. Search is an exact
//! cosine scan; filings corpora are small enough that no approximate
//! structure is needed.
//!
//! # Persisted layout
//!
//! ```text
//! <data_dir>/index/filings_index/
//! ├── manifest.json   version, model, dims, chunk metadata in entry order
//! └── vectors.bin     entry vectors, little-endian f32, concatenated
//! ```
//!
//! Both files are written into a sibling `filings_index.staging/`
//! directory, which replaces the index directory once complete. A crash
//! before the swap leaves the previous index; a crash during it leaves no
//! index, which loads as `NotFound` and is rebuilt from the documents.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::embedding::{blob_to_vec, cosine_similarity, embed_batched, vec_to_blob, Embedder};
use crate::error::{IndexError, IndexLoadError};
use crate::models::{ScoredChunk, TextChunk};

const MANIFEST_FILE: &str = "manifest.json";
const VECTORS_FILE: &str = "vectors.bin";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: TextChunk,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct VectorIndex {
    model: String,
    dims: usize,
    entries: Vec<IndexEntry>,
}

/// What a build produced: either a queryable index or nothing to query.
#[derive(Debug, Clone)]
pub enum IndexHandle {
    /// Built from zero chunks. Answering treats this as "no data".
    Empty,
    Ready(Arc<VectorIndex>),
}

impl IndexHandle {
    pub fn is_empty(&self) -> bool {
        match self {
            IndexHandle::Empty => true,
            IndexHandle::Ready(index) => index.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IndexHandle::Empty => 0,
            IndexHandle::Ready(index) => index.len(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Manifest {
    version: u32,
    model: String,
    dims: usize,
    chunks: Vec<TextChunk>,
}

impl VectorIndex {
    /// Embed every chunk and build a fresh index.
    ///
    /// Returns [`IndexHandle::Empty`] for empty input.
    pub fn build(
        embedder: &dyn Embedder,
        chunks: Vec<TextChunk>,
        batch_size: usize,
    ) -> Result<IndexHandle> {
        if chunks.is_empty() {
            return Ok(IndexHandle::Empty);
        }
        let index = VectorIndex {
            model: embedder.model_name().to_string(),
            dims: embedder.dims(),
            entries: Vec::new(),
        }
        .merge(embedder, chunks, batch_size)?;
        Ok(IndexHandle::Ready(Arc::new(index)))
    }

    /// Embed `chunks` and append them. Chunks whose text hash is already in
    /// the index are skipped.
    pub fn merge(
        mut self,
        embedder: &dyn Embedder,
        chunks: Vec<TextChunk>,
        batch_size: usize,
    ) -> Result<VectorIndex> {
        if embedder.model_name() != self.model || embedder.dims() != self.dims {
            bail!(
                "cannot merge {} ({} dims) vectors into an index built with {} ({} dims)",
                embedder.model_name(),
                embedder.dims(),
                self.model,
                self.dims
            );
        }

        let mut seen: HashSet<String> =
            self.entries.iter().map(|e| e.chunk.hash.clone()).collect();
        let fresh: Vec<TextChunk> = chunks
            .into_iter()
            .filter(|c| seen.insert(c.hash.clone()))
            .collect();
        if fresh.is_empty() {
            return Ok(self);
        }

        let texts: Vec<String> = fresh.iter().map(|c| c.text.clone()).collect();
        let vectors = embed_batched(embedder, &texts, batch_size)?;
        debug!(added = fresh.len(), model = %self.model, "embedded chunks");

        self.entries.extend(
            fresh
                .into_iter()
                .zip(vectors)
                .map(|(chunk, vector)| IndexEntry { chunk, vector }),
        );
        Ok(self)
    }

    /// Drop entries whose source document is not in `sources`. Returns how
    /// many entries were removed.
    pub fn retain_sources(&mut self, sources: &HashSet<String>) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|e| sources.contains(&e.chunk.source_document_id));
        before - self.entries.len()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Top `k` entries by cosine similarity, best first. Equal scores keep
    /// insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, IndexError> {
        if self.entries.is_empty() {
            return Err(IndexError::Empty);
        }
        if query.len() != self.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                found: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, &e.vector)))
            .collect();
        // sort_by is stable.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, score)| ScoredChunk {
                score,
                chunk: self.entries[i].chunk.clone(),
            })
            .collect())
    }

    pub fn persist(&self, dir: &Path) -> Result<(), IndexLoadError> {
        let manifest = Manifest {
            version: FORMAT_VERSION,
            model: self.model.clone(),
            dims: self.dims,
            chunks: self.entries.iter().map(|e| e.chunk.clone()).collect(),
        };
        let json = serde_json::to_vec_pretty(&manifest).map_err(|e| IndexLoadError::Corrupt {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut blob = Vec::with_capacity(self.entries.len() * self.dims * 4);
        for entry in &self.entries {
            blob.extend_from_slice(&vec_to_blob(&entry.vector));
        }

        let staging = staging_dir(dir);
        if staging.exists() {
            std::fs::remove_dir_all(&staging)?;
        }
        std::fs::create_dir_all(&staging)?;
        std::fs::write(staging.join(VECTORS_FILE), &blob)?;
        std::fs::write(staging.join(MANIFEST_FILE), &json)?;

        if dir.exists() {
            std::fs::remove_dir_all(dir)?;
        }
        std::fs::rename(&staging, dir)?;

        info!(path = %dir.display(), entries = self.entries.len(), "persisted index");
        Ok(())
    }

    /// Load a persisted index, refusing one built by a different embedder.
    pub fn load(dir: &Path, embedder: &dyn Embedder) -> Result<VectorIndex, IndexLoadError> {
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(IndexLoadError::NotFound(dir.to_path_buf()));
        }

        let corrupt = |reason: String| IndexLoadError::Corrupt {
            path: dir.to_path_buf(),
            reason,
        };

        let raw = std::fs::read(&manifest_path)?;
        let manifest: Manifest =
            serde_json::from_slice(&raw).map_err(|e| corrupt(format!("manifest: {}", e)))?;
        if manifest.version != FORMAT_VERSION {
            return Err(corrupt(format!(
                "unsupported format version {}",
                manifest.version
            )));
        }

        if manifest.model != embedder.model_name() || manifest.dims != embedder.dims() {
            return Err(IndexLoadError::Incompatible {
                expected_model: embedder.model_name().to_string(),
                expected_dims: embedder.dims(),
                found_model: manifest.model,
                found_dims: manifest.dims,
            });
        }

        let blob = std::fs::read(dir.join(VECTORS_FILE))
            .map_err(|e| corrupt(format!("vectors: {}", e)))?;
        let expected_len = manifest.chunks.len() * manifest.dims * 4;
        if blob.len() != expected_len {
            return Err(corrupt(format!(
                "vectors.bin holds {} bytes, expected {}",
                blob.len(),
                expected_len
            )));
        }

        let entries = if manifest.dims == 0 {
            Vec::new()
        } else {
            manifest
                .chunks
                .into_iter()
                .zip(blob.chunks_exact(manifest.dims * 4))
                .map(|(chunk, bytes)| IndexEntry {
                    chunk,
                    vector: blob_to_vec(bytes),
                })
                .collect()
        };

        Ok(VectorIndex {
            model: manifest.model,
            dims: manifest.dims,
            entries,
        })
    }
}

fn staging_dir(dir: &Path) -> PathBuf {
    let mut name = dir.as_os_str().to_owned();
    name.push(".staging");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;
    use crate::embedding::HashEmbedder;

    fn sample_chunks() -> Vec<TextChunk> {
        let mut chunks = chunk_text("a.pdf", "Revenue grew twelve percent on strong deal wins", 1000, 0).unwrap();
        chunks.extend(chunk_text("b.pdf", "Attrition declined while utilisation improved", 1000, 0).unwrap());
        chunks.extend(chunk_text("c.pdf", "Operating margin contracted on wage hikes", 1000, 0).unwrap());
        chunks
    }

    fn ready(handle: IndexHandle) -> Arc<VectorIndex> {
        match handle {
            IndexHandle::Ready(index) => index,
            IndexHandle::Empty => panic!("expected a ready index"),
        }
    }

    #[test]
    fn empty_input_gives_empty_handle() {
        let handle = VectorIndex::build(&HashEmbedder::default(), vec![], 8).unwrap();
        assert!(matches!(handle, IndexHandle::Empty));
        assert!(handle.is_empty());
    }

    #[test]
    fn search_ranks_own_text_first() {
        let embedder = HashEmbedder::default();
        let chunks = sample_chunks();
        let index = ready(VectorIndex::build(&embedder, chunks.clone(), 2).unwrap());

        for chunk in &chunks {
            let q = embedder.embed_query(&chunk.text).unwrap();
            let hits = index.search(&q, 3).unwrap();
            assert_eq!(hits[0].chunk.id, chunk.id);
            assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
        }
    }

    #[test]
    fn ties_keep_insertion_order() {
        let embedder = HashEmbedder::new(16);
        let mut chunks = chunk_text("x.pdf", "same words", 100, 0).unwrap();
        let mut twin = chunk_text("y.pdf", "same words", 100, 0).unwrap();
        // Different hash so merge keeps both.
        twin[0].hash = "other".into();
        chunks.append(&mut twin);
        let index = ready(VectorIndex::build(&embedder, chunks, 8).unwrap());

        let q = embedder.embed_query("same words").unwrap();
        let hits = index.search(&q, 2).unwrap();
        assert_eq!(hits[0].chunk.source_document_id, "x.pdf");
        assert_eq!(hits[1].chunk.source_document_id, "y.pdf");
    }

    #[test]
    fn search_rejects_wrong_dimension() {
        let embedder = HashEmbedder::new(16);
        let index = ready(VectorIndex::build(&embedder, sample_chunks(), 8).unwrap());
        let err = index.search(&[1.0, 0.0], 1).unwrap_err();
        assert_eq!(
            err,
            IndexError::DimensionMismatch {
                expected: 16,
                found: 2
            }
        );
    }

    #[test]
    fn merge_appends_and_skips_duplicates() {
        let embedder = HashEmbedder::default();
        let chunks = sample_chunks();
        let index = ready(VectorIndex::build(&embedder, chunks[..2].to_vec(), 8).unwrap());
        let merged = (*index).clone().merge(&embedder, chunks.clone(), 8).unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.entries()[2].chunk.id, chunks[2].id);
    }

    #[test]
    fn retain_sources_drops_missing_documents() {
        let embedder = HashEmbedder::default();
        let mut index = (*ready(VectorIndex::build(&embedder, sample_chunks(), 8).unwrap())).clone();
        let keep: HashSet<String> = ["a.pdf", "c.pdf"].iter().map(|s| s.to_string()).collect();

        assert_eq!(index.retain_sources(&keep), 1);
        assert_eq!(index.retain_sources(&keep), 0);
        let sources: Vec<&str> = index
            .entries()
            .iter()
            .map(|e| e.chunk.source_document_id.as_str())
            .collect();
        assert_eq!(sources, vec!["a.pdf", "c.pdf"]);
    }

    #[test]
    fn repersist_replaces_index_and_leaves_no_staging() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("filings_index");
        let embedder = HashEmbedder::default();
        let full = ready(VectorIndex::build(&embedder, sample_chunks(), 8).unwrap());
        full.persist(&dir).unwrap();

        // Leftover from an interrupted write.
        std::fs::create_dir_all(staging_dir(&dir)).unwrap();
        std::fs::write(staging_dir(&dir).join(VECTORS_FILE), b"junk").unwrap();

        let small = ready(VectorIndex::build(&embedder, sample_chunks()[..1].to_vec(), 8).unwrap());
        small.persist(&dir).unwrap();

        assert!(!staging_dir(&dir).exists());
        let loaded = VectorIndex::load(&dir, &embedder).unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn merge_refuses_other_model() {
        let index = ready(VectorIndex::build(&HashEmbedder::new(16), sample_chunks(), 8).unwrap());
        let err = (*index)
            .clone()
            .merge(&HashEmbedder::new(32), sample_chunks(), 8)
            .unwrap_err();
        assert!(err.to_string().contains("cannot merge"));
    }

    #[test]
    fn persist_then_load_preserves_top_hit() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = HashEmbedder::default();
        let chunks = sample_chunks();
        let index = ready(VectorIndex::build(&embedder, chunks.clone(), 8).unwrap());
        index.persist(dir.path()).unwrap();

        let loaded = VectorIndex::load(dir.path(), &embedder).unwrap();
        assert_eq!(loaded.len(), chunks.len());
        for chunk in &chunks {
            let q = embedder.embed_query(&chunk.text).unwrap();
            assert_eq!(loaded.search(&q, 1).unwrap()[0].chunk.id, chunk.id);
        }
    }

    #[test]
    fn load_missing_dir_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = VectorIndex::load(&dir.path().join("nope"), &HashEmbedder::default()).unwrap_err();
        assert!(matches!(err, IndexLoadError::NotFound(_)));
    }

    #[test]
    fn load_with_other_embedder_is_incompatible() {
        let dir = tempfile::tempdir().unwrap();
        let index = ready(VectorIndex::build(&HashEmbedder::new(16), sample_chunks(), 8).unwrap());
        index.persist(dir.path()).unwrap();

        let err = VectorIndex::load(dir.path(), &HashEmbedder::new(32)).unwrap_err();
        assert!(matches!(
            err,
            IndexLoadError::Incompatible {
                expected_dims: 32,
                found_dims: 16,
                ..
            }
        ));
    }

    #[test]
    fn truncated_vectors_are_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = HashEmbedder::new(16);
        let index = ready(VectorIndex::build(&embedder, sample_chunks(), 8).unwrap());
        index.persist(dir.path()).unwrap();
        std::fs::write(dir.path().join(VECTORS_FILE), [0u8; 7]).unwrap();

        let err = VectorIndex::load(dir.path(), &embedder).unwrap_err();
        assert!(matches!(err, IndexLoadError::Corrupt { .. }));
    }
}
