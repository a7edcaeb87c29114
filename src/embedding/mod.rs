//! Embedding provider abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and concrete implementations:
//! - **[`LocalEmbedder`]** runs a sentence-transformer locally via fastembed
//!   (default `all-minilm-l6-v2`); no network calls after the model download.
//! - **[`OpenAIEmbedder`]** calls an OpenAI-compatible `/embeddings` endpoint.
//! - **[`OllamaEmbedder`]** calls a local Ollama instance's `/api/embed`.
//! - **[`HashEmbedder`]** hashes tokens into buckets; deterministic and
//!   offline, used for tests and air-gapped setups.
//!
//! Also provides vector utilities used by the persisted index:
//! - [`cosine_similarity`] compute similarity between two embedding vectors
//! - [`vec_to_blob`] encode a `Vec<f32>` as little-endian bytes
//! - [`blob_to_vec`] decode those bytes back into a `Vec<f32>`
//!
//! # Retry Strategy
//!
//! The OpenAI and Ollama providers use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! All providers are blocking. Async callers go through
//! `tokio::task::spawn_blocking`.

mod hashed;

pub use hashed::{HashEmbedder, DEFAULT_HASH_DIMS, HASH_MODEL_NAME};

use anyhow::{bail, Result};
use std::time::Duration;
use tracing::warn;

use crate::config::EmbeddingConfig;

/// Default local model, a 384-dim MiniLM sentence transformer.
pub const DEFAULT_LOCAL_MODEL: &str = "all-minilm-l6-v2";

/// A text embedding backend.
///
/// The model name and dimensionality are persisted alongside an index so
/// that a later load can refuse vectors from a different model.
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts, returning one vector per input in order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query text.
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }
}

/// Embed `texts` in batches of `batch_size`, checking every vector's length.
pub fn embed_batched(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut out = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let vectors = embedder.embed(batch)?;
        if vectors.len() != batch.len() {
            bail!(
                "{} returned {} vectors for {} inputs",
                embedder.model_name(),
                vectors.len(),
                batch.len()
            );
        }
        for v in &vectors {
            if v.len() != embedder.dims() {
                bail!(
                    "{} returned a {}-dim vector, expected {}",
                    embedder.model_name(),
                    v.len(),
                    embedder.dims()
                );
            }
        }
        out.extend(vectors);
    }
    Ok(out)
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Calls `POST {url}/embeddings` (default `https://api.openai.com/v1`).
/// Requires the `OPENAI_API_KEY` environment variable to be set.
pub struct OpenAIEmbedder {
    model: String,
    dims: usize,
    url: String,
    api_key: String,
    timeout: Duration,
    max_retries: u32,
}

impl OpenAIEmbedder {
    /// # Errors
    ///
    /// Returns an error if `model` or `dims` is not set in config,
    /// or if `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        Ok(Self {
            model,
            dims,
            url: url.trim_end_matches('/').to_string(),
            api_key,
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
        })
    }
}

impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = post_with_retry(
            "OpenAI",
            &format!("{}/embeddings", self.url),
            Some(&self.api_key),
            &body,
            self.timeout,
            self.max_retries,
        )?;
        parse_openai_response(&json)
    }
}

/// Parse the OpenAI embeddings API response JSON.
///
/// Extracts the `data[].embedding` arrays, ordered by `data[].index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut embeddings = Vec::with_capacity(data.len());

    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        embeddings.push((index, vec));
    }

    embeddings.sort_by_key(|(index, _)| *index);
    Ok(embeddings.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured Ollama URL (default: `http://localhost:11434`).
pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    url: String,
    timeout: Duration,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            model,
            dims,
            url: url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
        })
    }
}

impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = post_with_retry(
            "Ollama",
            &format!("{}/api/embed", self.url),
            None,
            &body,
            self.timeout,
            self.max_retries,
        )?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing embeddings array"))?;

    let mut result = Vec::with_capacity(embeddings.len());

    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: embedding is not an array"))?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }

    Ok(result)
}

/// POST a JSON body, retrying rate limits, server errors and network errors.
fn post_with_retry(
    service: &str,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    timeout: Duration,
    max_retries: u32,
) -> Result<serde_json::Value> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()?;

    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            std::thread::sleep(delay);
        }

        let mut request = client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(key) = bearer {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        match request.send() {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return Ok(response.json()?);
                }

                // Rate limited or server error, retry
                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().unwrap_or_default();
                    warn!(service, %status, attempt, "embedding request failed, retrying");
                    last_err = Some(anyhow::anyhow!(
                        "{} API error {}: {}",
                        service,
                        status,
                        body_text
                    ));
                    continue;
                }

                let body_text = response.text().unwrap_or_default();
                bail!("{} API error {}: {}", service, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow::anyhow!("{} connection error at {}: {}", service, url, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} embedding failed after retries", service)))
}

// ============ Local Provider (fastembed) ============

/// Embedding provider for local inference via fastembed.
///
/// The model is downloaded from Hugging Face on first use and cached.
/// After that, embeddings run entirely offline. ORT is bundled.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: std::sync::Mutex<Option<fastembed::TextEmbedding>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let (model_name, dims) = resolve_local_model(config);
        // Fail on unknown names before any download starts.
        config_to_fastembed_model(&model_name)?;
        Ok(Self {
            model_name,
            dims,
            batch_size: config.batch_size,
            model: std::sync::Mutex::new(None),
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut guard = self
            .model
            .lock()
            .map_err(|_| anyhow::anyhow!("local embedding model lock poisoned"))?;

        if guard.is_none() {
            let fastembed_model = config_to_fastembed_model(&self.model_name)?;
            let model = fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(fastembed_model).with_show_download_progress(true),
            )
            .map_err(|e| anyhow::anyhow!("Failed to initialize local embedding model: {}", e))?;
            *guard = Some(model);
        }

        let model = guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("local embedding model unavailable"))?;
        model
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| anyhow::anyhow!("Local embedding failed: {}", e))
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn resolve_local_model(config: &EmbeddingConfig) -> (String, usize) {
    let model_name = config
        .model
        .clone()
        .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());

    let dims = config.dims.unwrap_or(match model_name.as_str() {
        "all-minilm-l6-v2" => 384,
        "bge-small-en-v1.5" => 384,
        "bge-base-en-v1.5" => 768,
        "bge-large-en-v1.5" => 1024,
        "nomic-embed-text-v1.5" => 768,
        _ => 384,
    });

    (model_name, dims)
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1.5",
            other
        ),
    }
}

/// Create the appropriate [`Embedder`] based on configuration.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"local"` | [`LocalEmbedder`] (requires `local-embeddings-fastembed`) |
/// | `"openai"` | [`OpenAIEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"hash"` | [`HashEmbedder`] |
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Box::new(OllamaEmbedder::new(config)?)),
        "hash" => Ok(Box::new(HashEmbedder::new(
            config.dims.unwrap_or(DEFAULT_HASH_DIMS),
        ))),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Box::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!(
            "Local embedding provider requires --features local-embeddings-fastembed; \
             use provider = \"hash\" for an offline build"
        ),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Encode a float vector as little-endian f32 bytes.
///
/// ```rust
/// use filing_harness::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Reverses [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors
/// of different lengths, or a zero vector.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        let restored = blob_to_vec(&blob);
        assert_eq!(vec, restored);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_different_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn openai_response_is_reordered_by_index() {
        let json = serde_json::json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        });
        let vectors = parse_openai_response(&json).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn ollama_response_requires_embeddings_array() {
        assert!(parse_ollama_response(&serde_json::json!({"nope": 1})).is_err());
    }

    #[test]
    fn hash_provider_from_config() {
        let config = EmbeddingConfig {
            provider: "hash".into(),
            dims: Some(32),
            ..EmbeddingConfig::default()
        };
        let embedder = create_embedder(&config).unwrap();
        assert_eq!(embedder.model_name(), HASH_MODEL_NAME);
        assert_eq!(embedder.dims(), 32);
    }

    #[test]
    fn batched_embedding_checks_dims() {
        struct Short;
        impl Embedder for Short {
            fn model_name(&self) -> &str {
                "short"
            }
            fn dims(&self) -> usize {
                4
            }
            fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
            }
        }
        let err = embed_batched(&Short, &["a".into()], 8).unwrap_err();
        assert!(err.to_string().contains("2-dim"));
    }

    #[test]
    fn batched_embedding_preserves_order_across_batches() {
        let e = HashEmbedder::new(16);
        let texts: Vec<String> = (0..5).map(|i| format!("text {i}")).collect();
        let batched = embed_batched(&e, &texts, 2).unwrap();
        let direct = e.embed(&texts).unwrap();
        assert_eq!(batched, direct);
    }
}
