use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Fixed name of the persisted vector index under `<data_dir>/index/`.
pub const INDEX_NAME: &str = "filings_index";

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub acquire: AcquireConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub llm: LlmConfig,
    pub market: MarketConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

impl StorageConfig {
    pub fn documents_dir(&self) -> PathBuf {
        self.data_dir.join("documents")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.data_dir.join("index").join(INDEX_NAME)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AcquireConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_documents: usize,
    pub retention_days: i64,
    pub viewer_markers: Vec<String>,
    pub gateway_markers: Vec<String>,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.screener.in".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            timeout_secs: 30,
            max_documents: 10,
            retention_days: 365,
            viewer_markers: vec!["xml-data/corpfiling".to_string()],
            gateway_markers: vec!["AnnPdfOpen.aspx".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters.
    pub chunk_size: usize,
    /// Characters shared by consecutive windows.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            overlap: 200,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 || self.overlap >= self.chunk_size {
            return Err(ConfigError::InvalidChunking {
                size: self.chunk_size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: Option<String>,
    pub dims: Option<usize>,
    pub batch_size: usize,
    pub max_retries: u32,
    pub timeout_secs: u64,
    pub url: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "local".to_string(),
            model: None,
            dims: None,
            batch_size: 64,
            max_retries: 3,
            timeout_secs: 30,
            url: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_context_chars: 12_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: Option<String>,
    pub temperature: f32,
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_tokens: Option<u32>,
    pub json_mode: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            temperature: 0.0,
            api_key_env: None,
            base_url: None,
            timeout_secs: 60,
            max_tokens: None,
            json_mode: true,
        }
    }
}

impl LlmConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// Name of the environment variable holding the credential.
    pub fn api_key_var(&self) -> String {
        if let Some(ref var) = self.api_key_env {
            return var.clone();
        }
        match self.provider.as_str() {
            "groq" => "GROQ_API_KEY".to_string(),
            _ => "OPENAI_API_KEY".to_string(),
        }
    }

    pub fn endpoint(&self) -> String {
        if let Some(ref url) = self.base_url {
            return url.trim_end_matches('/').to_string();
        }
        match self.provider.as_str() {
            "groq" => "https://api.groq.com/openai/v1".to_string(),
            _ => "https://api.openai.com/v1".to_string(),
        }
    }

    pub fn model_name(&self) -> String {
        if let Some(ref model) = self.model {
            return model.clone();
        }
        match self.provider.as_str() {
            "groq" => "openai/gpt-oss-120b".to_string(),
            _ => "gpt-4o-mini".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MarketConfig {
    pub base_url: String,
    pub symbol_suffix: String,
    pub timeout_secs: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            symbol_suffix: ".NS".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8088".to_string(),
        }
    }
}

impl Config {
    /// Defaults rooted at `data_dir`, used by tests and tooling that run
    /// without a config file.
    pub fn minimal(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage: StorageConfig {
                data_dir: data_dir.into(),
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.chunking.validate()?;

        if self.retrieval.top_k < 1 {
            return Err(ConfigError::Invalid("retrieval.top_k must be >= 1".into()));
        }
        if self.retrieval.max_context_chars == 0 {
            return Err(ConfigError::Invalid(
                "retrieval.max_context_chars must be > 0".into(),
            ));
        }
        if self.acquire.retention_days < 0 {
            return Err(ConfigError::Invalid(format!(
                "acquire.retention_days must be >= 0, got {}",
                self.acquire.retention_days
            )));
        }
        if chrono::Duration::try_days(self.acquire.retention_days).is_none() {
            return Err(ConfigError::Invalid(format!(
                "acquire.retention_days {} is out of range",
                self.acquire.retention_days
            )));
        }
        if self.embedding.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "embedding.batch_size must be > 0".into(),
            ));
        }

        match self.embedding.provider.as_str() {
            "local" | "hash" => {}
            "openai" | "ollama" => {
                if self.embedding.model.is_none() {
                    return Err(ConfigError::Invalid(format!(
                        "embedding.model must be specified when provider is '{}'",
                        self.embedding.provider
                    )));
                }
                if matches!(self.embedding.dims, None | Some(0)) {
                    return Err(ConfigError::Invalid(format!(
                        "embedding.dims must be > 0 when provider is '{}'",
                        self.embedding.provider
                    )));
                }
            }
            other => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown embedding provider: '{}'. Must be local, openai, ollama, or hash.",
                    other
                )))
            }
        }

        match self.llm.provider.as_str() {
            "openai" | "groq" | "disabled" => {}
            other => {
                return Err(ConfigError::Invalid(format!(
                    "Unknown llm provider: '{}'. Must be openai, groq, or disabled.",
                    other
                )))
            }
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid(
                "llm.temperature must be in [0.0, 2.0]".into(),
            ));
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;

    Ok(config)
}
