//! Sliding-window text chunker.
//!
//! Splits extracted document text into [`TextChunk`]s of at most
//! `chunk_size` characters, each window advancing by `chunk_size - overlap`.
//! Boundaries are character positions, not tokens or sentences. The last
//! window always ends exactly at the end of the text.
//!
//! Each chunk receives a random UUID plus a SHA-256 hash of its text, used
//! to skip duplicate passages when an index is merged.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::ChunkingConfig;
use crate::error::ConfigError;
use crate::models::TextChunk;

/// Iterator over `(start, end)` character windows.
///
/// Cloning restarts the sequence from wherever the clone was taken.
#[derive(Debug, Clone)]
pub struct Windows {
    len: usize,
    size: usize,
    step: usize,
    next_start: Option<usize>,
}

impl Windows {
    pub fn new(len: usize, size: usize, overlap: usize) -> Result<Self, ConfigError> {
        ChunkingConfig {
            chunk_size: size,
            overlap,
        }
        .validate()?;

        Ok(Self {
            len,
            size,
            step: size - overlap,
            next_start: if len == 0 { None } else { Some(0) },
        })
    }
}

impl Iterator for Windows {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start?;
        let end = (start + self.size).min(self.len);
        self.next_start = if end >= self.len {
            None
        } else {
            Some(start + self.step)
        };
        Some((start, end))
    }
}

/// Split text into overlapping windows.
/// Returns chunks with contiguous indices starting at 0; empty text yields none.
pub fn chunk_text(
    document_id: &str,
    text: &str,
    size: usize,
    overlap: usize,
) -> Result<Vec<TextChunk>, ConfigError> {
    // Byte offset of every char boundary, plus the end of the string.
    let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    boundaries.push(text.len());
    let char_len = boundaries.len() - 1;

    let mut chunks = Vec::new();
    let mut prev_end = 0;
    for (index, (start, end)) in Windows::new(char_len, size, overlap)?.enumerate() {
        let piece = &text[boundaries[start]..boundaries[end]];
        let shared = if index == 0 { 0 } else { prev_end - start };
        chunks.push(make_chunk(document_id, index, start, end, shared, piece));
        prev_end = end;
    }

    Ok(chunks)
}

fn make_chunk(
    document_id: &str,
    index: usize,
    start: usize,
    end: usize,
    overlap: usize,
    text: &str,
) -> TextChunk {
    TextChunk {
        id: Uuid::new_v4().to_string(),
        source_document_id: document_id.to_string(),
        chunk_index: index,
        start,
        end,
        overlap,
        text: text.to_string(),
        hash: content_hash(text),
    }
}

pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
