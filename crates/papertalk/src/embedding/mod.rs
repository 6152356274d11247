//! Embedding backends implementing [`papertalk_core::embedding::Embedder`].
//!
//! - **[`DisabledEmbedder`]**: returns errors; used when embeddings are not configured.
//! - **[`OpenAIEmbedder`]**: calls the OpenAI embeddings API.
//! - **[`OllamaEmbedder`]**: calls a local Ollama instance's `/api/embed` endpoint.
//! - **`LocalEmbedder`**: runs models in-process via fastembed (feature
//!   `local-embeddings-fastembed`); no network calls after model download.
//!
//! HTTP backends share the retry policy documented in [`crate::http`].
//!
//! # Provider Selection
//!
//! ```rust
//! # use papertalk::config::EmbeddingConfig;
//! # use papertalk::embedding::create_embedder;
//! let config = EmbeddingConfig {
//!     provider: "disabled".to_string(),
//!     ..EmbeddingConfig::default()
//! };
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.model_name(), "disabled");
//! ```

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use papertalk_core::embedding::Embedder;
use papertalk_core::PipelineError;

use crate::config::EmbeddingConfig;
use crate::http::{join_url, JsonEndpoint};

pub const DEFAULT_OPENAI_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_OLLAMA_EMBEDDING_MODEL: &str = "all-minilm";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

fn unavailable(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::EmbeddingUnavailable(e.to_string())
}

// ============ Disabled Provider ============

/// Fails every call. Lets commands that never embed (e.g. `extract`) run
/// without a model.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed(&self, _texts: &[String]) -> papertalk_core::Result<Vec<Vec<f32>>> {
        Err(unavailable("embedding provider is disabled"))
    }
}

// ============ OpenAI Provider ============

/// Calls `POST /v1/embeddings`. Requires `OPENAI_API_KEY`.
pub struct OpenAIEmbedder {
    model: String,
    dims: usize,
    endpoint: JsonEndpoint,
}

impl OpenAIEmbedder {
    /// # Errors
    ///
    /// Returns an error if `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => bail!("OPENAI_API_KEY environment variable not set"),
        };
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_OPENAI_EMBEDDING_MODEL.to_string());
        let dims = config.dims.unwrap_or_else(|| openai_model_dims(&model));
        let base = config.url.as_deref().unwrap_or(DEFAULT_OPENAI_URL);
        let endpoint = JsonEndpoint::new(
            "OpenAI",
            join_url(base, "/v1/embeddings"),
            Some(api_key),
            config.timeout_secs,
            config.max_retries,
        )?;
        Ok(Self {
            model,
            dims,
            endpoint,
        })
    }
}

/// Known output sizes; `0` (learn from the first response) otherwise.
fn openai_model_dims(model: &str) -> usize {
    match model {
        "text-embedding-ada-002" | "text-embedding-3-small" => 1536,
        "text-embedding-3-large" => 3072,
        _ => 0,
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> papertalk_core::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = self.endpoint.post(&body).await.map_err(unavailable)?;
        parse_openai_response(&json)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> papertalk_core::Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| unavailable("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| unavailable("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, json_floats(embedding)));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

/// Calls `POST /api/embed` on the configured Ollama URL (default:
/// `http://localhost:11434`). Requires the model to be pulled
/// (e.g. `ollama pull all-minilm`).
pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    endpoint: JsonEndpoint,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_EMBEDDING_MODEL.to_string());
        let base = config.url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);
        let endpoint = JsonEndpoint::new(
            "Ollama",
            join_url(base, "/api/embed"),
            None,
            config.timeout_secs,
            config.max_retries,
        )?;
        Ok(Self {
            model,
            dims: config.dims.unwrap_or(0),
            endpoint,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed(&self, texts: &[String]) -> papertalk_core::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        tracing::debug!(url = self.endpoint.url(), batch = texts.len(), "ollama embed");
        let json = self.endpoint.post(&body).await.map_err(unavailable)?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> papertalk_core::Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| unavailable("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|embedding| {
            embedding
                .as_array()
                .map(|values| json_floats(values))
                .ok_or_else(|| unavailable("Invalid Ollama response: embedding is not an array"))
        })
        .collect()
}

fn json_floats(values: &[serde_json::Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}

// ============ Local Provider (fastembed) ============

#[cfg(feature = "local-embeddings-fastembed")]
mod local {
    use std::sync::{Arc, Mutex};

    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use papertalk_core::embedding::Embedder;

    use super::unavailable;
    use crate::config::EmbeddingConfig;

    const DEFAULT_LOCAL_MODEL: &str = "all-minilm-l6-v2";

    /// In-process inference. The model is downloaded from Hugging Face on
    /// first use, cached, and kept loaded for the life of the embedder.
    pub struct LocalEmbedder {
        model_name: String,
        dims: usize,
        batch_size: usize,
        kind: fastembed::EmbeddingModel,
        model: Arc<Mutex<Option<fastembed::TextEmbedding>>>,
    }

    impl LocalEmbedder {
        pub fn new(config: &EmbeddingConfig) -> Result<Self> {
            let model_name = config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string());
            let (kind, known_dims) = fastembed_model(&model_name)?;
            Ok(Self {
                dims: config.dims.unwrap_or(known_dims),
                model_name,
                batch_size: config.batch_size,
                kind,
                model: Arc::new(Mutex::new(None)),
            })
        }
    }

    fn fastembed_model(name: &str) -> Result<(fastembed::EmbeddingModel, usize)> {
        match name {
            "all-minilm-l6-v2" => Ok((fastembed::EmbeddingModel::AllMiniLML6V2, 384)),
            "bge-small-en-v1.5" => Ok((fastembed::EmbeddingModel::BGESmallENV15, 384)),
            "bge-base-en-v1.5" => Ok((fastembed::EmbeddingModel::BGEBaseENV15, 768)),
            "bge-large-en-v1.5" => Ok((fastembed::EmbeddingModel::BGELargeENV15, 1024)),
            "nomic-embed-text-v1.5" => Ok((fastembed::EmbeddingModel::NomicEmbedTextV15, 768)),
            "multilingual-e5-small" => Ok((fastembed::EmbeddingModel::MultilingualE5Small, 384)),
            other => bail!(
                "Unknown local embedding model: '{}'. Supported models: \
                 all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
                 nomic-embed-text-v1.5, multilingual-e5-small",
                other
            ),
        }
    }

    #[async_trait]
    impl Embedder for LocalEmbedder {
        fn model_name(&self) -> &str {
            &self.model_name
        }
        fn dims(&self) -> usize {
            self.dims
        }
        async fn embed(&self, texts: &[String]) -> papertalk_core::Result<Vec<Vec<f32>>> {
            let texts = texts.to_vec();
            let slot = self.model.clone();
            let kind = self.kind.clone();
            let batch_size = self.batch_size;

            tokio::task::spawn_blocking(move || {
                let mut guard = slot
                    .lock()
                    .map_err(|_| unavailable("local embedding model lock poisoned"))?;
                if guard.is_none() {
                    let model = fastembed::TextEmbedding::try_new(
                        fastembed::InitOptions::new(kind).with_show_download_progress(true),
                    )
                    .map_err(|e| {
                        unavailable(format!("Failed to initialize local embedding model: {}", e))
                    })?;
                    *guard = Some(model);
                }
                match guard.as_mut() {
                    Some(model) => model
                        .embed(texts, Some(batch_size))
                        .map_err(|e| unavailable(format!("Local embedding failed: {}", e))),
                    None => Err(unavailable("local embedding model not loaded")),
                }
            })
            .await
            .map_err(unavailable)?
        }
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
pub use local::LocalEmbedder;

/// Create the [`Embedder`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"local"` | `LocalEmbedder` (feature `local-embeddings-fastembed`) |
///
/// # Errors
///
/// Unknown provider names, a missing API key, or `"local"` without the
/// feature compiled in.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings-fastembed"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn openai_response_is_ordered_by_index() {
        let json = json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        });
        let vectors = parse_openai_response(&json).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn openai_response_without_data_is_unavailable() {
        let err = parse_openai_response(&json!({"error": "nope"})).unwrap_err();
        assert!(matches!(err, PipelineError::EmbeddingUnavailable(_)));
    }

    #[test]
    fn ollama_response_is_parsed_in_order() {
        let json = json!({"model": "all-minilm", "embeddings": [[0.5, 0.25], [1.0, -1.0]]});
        let vectors = parse_ollama_response(&json).unwrap();
        assert_eq!(vectors, vec![vec![0.5, 0.25], vec![1.0, -1.0]]);
    }

    #[test]
    fn ollama_response_with_bad_entry_is_unavailable() {
        let err = parse_ollama_response(&json!({"embeddings": ["x"]})).unwrap_err();
        assert!(err.to_string().contains("not an array"));
    }

    #[test]
    fn ollama_defaults_to_all_minilm() {
        let embedder = OllamaEmbedder::new(&EmbeddingConfig::default()).unwrap();
        assert_eq!(embedder.model_name(), "all-minilm");
        assert_eq!(embedder.dims(), 0);
        assert_eq!(embedder.endpoint.url(), "http://localhost:11434/api/embed");
    }

    #[test]
    fn known_openai_dims() {
        assert_eq!(openai_model_dims("text-embedding-ada-002"), 1536);
        assert_eq!(openai_model_dims("text-embedding-3-large"), 3072);
        assert_eq!(openai_model_dims("custom"), 0);
    }

    #[tokio::test]
    async fn disabled_embedder_fails() {
        let err = DisabledEmbedder
            .embed(&["hello".to_string()])
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config = EmbeddingConfig {
            provider: "magic".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(create_embedder(&config).is_err());
    }
}
