//! TOML configuration.
//!
//! Every section is optional; missing values fall back to 500-char chunks
//! with 50 overlap, Ollama `all-minilm` embeddings, Ollama `gemma3:1b`
//! answers and k = 4.
//!
//! ```toml
//! [chunking]
//! chunk_size = 500
//! overlap = 50
//!
//! [retrieval]
//! top_k = 4
//!
//! [embedding]
//! provider = "ollama"
//! model = "all-minilm"
//!
//! [generation]
//! provider = "ollama"
//! model = "gemma3:1b"
//!
//! [index]
//! path = "./data/papertalk.sqlite"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use papertalk_core::chunk::ChunkConfig;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

impl ChunkingConfig {
    pub fn to_chunk_config(&self) -> ChunkConfig {
        ChunkConfig {
            chunk_size: self.chunk_size,
            overlap: self.overlap,
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub min_score: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: None,
        }
    }
}

fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: 0,
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_embedding_provider() -> String {
    "ollama".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub max_history_turns: Option<usize>,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            url: None,
            temperature: 0.0,
            max_history_turns: None,
            max_retries: 0,
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_provider() -> String {
    "ollama".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_path")]
    pub path: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
        }
    }
}

fn default_index_path() -> PathBuf {
    PathBuf::from("./data/papertalk.sqlite")
}

/// Read and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Load `path` if it exists, otherwise validated built-in defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found; using defaults");
        let config = Config::default();
        validate(&config)?;
        Ok(config)
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    config
        .chunking
        .to_chunk_config()
        .validate()
        .context("Invalid [chunking] section")?;

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }
    if let Some(min) = config.retrieval.min_score {
        if !(-1.0..=1.0).contains(&min) {
            bail!("retrieval.min_score must be in [-1.0, 1.0]");
        }
    }

    // Validate embedding
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0 when set");
    }

    // Validate generation
    match config.generation.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown generation provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if !(0.0..=2.0).contains(&config.generation.temperature) {
        bail!("generation.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_papertalk_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.chunking.chunk_size, 500);
        assert_eq!(config.chunking.overlap, 50);
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.embedding.provider, "ollama");
        assert_eq!(config.embedding.max_retries, 0);
        assert_eq!(config.generation.provider, "ollama");
        assert_eq!(config.generation.temperature, 0.0);
        assert_eq!(config.index.path, PathBuf::from("./data/papertalk.sqlite"));
    }

    #[test]
    fn overrides_are_read() {
        let config = parse_config(
            r#"
            [chunking]
            chunk_size = 1000
            overlap = 200

            [retrieval]
            top_k = 5
            min_score = 0.25

            [embedding]
            provider = "openai"
            model = "text-embedding-3-small"
            dims = 1536

            [generation]
            provider = "openai"
            model = "gpt-3.5-turbo"
            max_history_turns = 6
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.to_chunk_config().step(), 800);
        assert_eq!(config.retrieval.min_score, Some(0.25));
        assert_eq!(config.embedding.dims, Some(1536));
        assert_eq!(config.generation.max_history_turns, Some(6));
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let err = parse_config("[chunking]\nchunk_size = 50\noverlap = 50\n").unwrap_err();
        assert!(format!("{:#}", err).contains("invalid chunk configuration"));
    }

    #[test]
    fn zero_top_k_is_rejected() {
        assert!(parse_config("[retrieval]\ntop_k = 0\n").is_err());
    }

    #[test]
    fn unknown_providers_are_rejected() {
        assert!(parse_config("[embedding]\nprovider = \"magic\"\n").is_err());
        assert!(parse_config("[generation]\nprovider = \"local\"\n").is_err());
    }

    #[test]
    fn example_configs_parse() {
        let config = parse_config(include_str!("../../../config/ptalk.example.toml")).unwrap();
        assert_eq!(config.embedding.model.as_deref(), Some("all-minilm"));
        let config = parse_config(include_str!("../../../config/openai.example.toml")).unwrap();
        assert_eq!(config.generation.provider, "openai");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config_or_default(Path::new("/nonexistent/ptalk.toml")).unwrap();
        assert_eq!(config.retrieval.top_k, 4);
        assert!(load_config(Path::new("/nonexistent/ptalk.toml")).is_err());
    }
}
