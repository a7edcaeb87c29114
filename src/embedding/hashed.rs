use anyhow::Result;
use sha2::{Digest, Sha256};

use super::Embedder;

pub const HASH_MODEL_NAME: &str = "filing-harness/token-hash";
pub const DEFAULT_HASH_DIMS: usize = 384;

/// Hashes lower-cased tokens into a fixed number of buckets.
///
/// No model download and no network; identical text always maps to the
/// identical vector across processes. Retrieval quality is lexical only.
pub struct HashEmbedder {
    model_name: String,
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self {
            model_name: HASH_MODEL_NAME.to_string(),
            dims: dims.clamp(8, 4096),
        }
    }

    fn bucket(&self, token: &str) -> (usize, f32) {
        let digest = Sha256::digest(token.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let idx = (u64::from_le_bytes(head) % self.dims as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (idx, sign)
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];
        let lowered = text.to_lowercase();
        let tokens = lowered
            .split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
            .filter(|token| !token.is_empty());

        for token in tokens {
            let (idx, sign) = self.bucket(token);
            vector[idx] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_DIMS)
    }
}

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[test]
    fn same_text_same_vector() {
        let e = HashEmbedder::default();
        let a = e.embed_query("Revenue grew 12% in Q2").unwrap();
        let b = e.embed_query("Revenue grew 12% in Q2").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), DEFAULT_HASH_DIMS);
    }

    #[test]
    fn case_and_punctuation_are_ignored() {
        let e = HashEmbedder::new(64);
        let a = e.embed_query("Deal wins, strong!").unwrap();
        let b = e.embed_query("deal WINS strong").unwrap();
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shared_words_score_higher() {
        let e = HashEmbedder::default();
        let q = e.embed_query("operating margin").unwrap();
        let near = e.embed_query("operating margin expanded by 80 bps").unwrap();
        let far = e.embed_query("attrition fell among freshers").unwrap();
        assert!(cosine_similarity(&q, &near) > cosine_similarity(&q, &far));
    }

    #[test]
    fn empty_text_is_zero_vector() {
        let e = HashEmbedder::new(16);
        let v = e.embed_query("  ").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
