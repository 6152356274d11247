//! Embedding index: chunks, their vectors, and the embedder that made them.
//!
//! An [`Index`] is built once per document and is read-only afterwards.
//! It keeps the [`Embedder`] it was built with so query vectors always
//! come from the same embedding space as the stored vectors; similarity
//! ranking is delegated to the [`VectorStore`].
//!
//! # Build Algorithm
//!
//! 1. Embed chunk texts in batches of `batch_size`.
//! 2. Check every batch returns one vector per text, all of one dimension.
//! 3. Bulk-insert the vectors into the store, keyed by chunk position.
//!
//! Any failure aborts the build; no partially embedded index is returned.

use std::sync::Arc;

use tracing::{debug, info};

use crate::embedding::Embedder;
use crate::error::{PipelineError, Result};
use crate::models::{Chunk, ScoredChunk};
use crate::store::memory::InMemoryVectorStore;
use crate::store::VectorStore;

/// Default number of chunks sent to the embedder per call.
pub const DEFAULT_BATCH_SIZE: usize = 64;

pub struct Index {
    chunks: Vec<Chunk>,
    store: Box<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    dims: usize,
}

impl Index {
    /// Embed `chunks` and index them in an [`InMemoryVectorStore`].
    ///
    /// # Errors
    ///
    /// [`PipelineError::EmbeddingUnavailable`] when the embedder fails or
    /// returns the wrong number of vectors or inconsistent dimensions.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: Arc<dyn Embedder>,
        batch_size: usize,
    ) -> Result<Self> {
        Self::build_with_store(
            chunks,
            embedder,
            batch_size,
            Box::new(InMemoryVectorStore::new()),
        )
        .await
    }

    /// Like [`build`](Index::build), but inserts into a caller-supplied
    /// store.
    ///
    /// The store must be empty, since payloads are chunk positions. A
    /// non-empty store is rejected with [`PipelineError::Store`] before
    /// anything is embedded.
    pub async fn build_with_store(
        chunks: Vec<Chunk>,
        embedder: Arc<dyn Embedder>,
        batch_size: usize,
        store: Box<dyn VectorStore>,
    ) -> Result<Self> {
        if !store.is_empty() {
            return Err(PipelineError::Store(format!(
                "index store already holds {} vectors",
                store.len()
            )));
        }
        let batch_size = batch_size.max(1);
        let mut dims = embedder.dims();
        let mut vectors = Vec::with_capacity(chunks.len());

        for (n, batch) in chunks.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = embedder.embed(&texts).await?;
            if embedded.len() != texts.len() {
                return Err(PipelineError::EmbeddingUnavailable(format!(
                    "model '{}' returned {} vectors for {} texts",
                    embedder.model_name(),
                    embedded.len(),
                    texts.len()
                )));
            }
            for v in embedded {
                check_dims(&mut dims, &v, embedder.model_name())?;
                vectors.push(v);
            }
            debug!(batch = n, size = texts.len(), "embedded chunk batch");
        }

        let index = Self::assemble(chunks, vectors, embedder, dims, store).await?;
        info!(
            model = index.model(),
            dims = index.dims,
            entries = index.len(),
            "built embedding index"
        );
        Ok(index)
    }

    /// Rebuild an index from previously computed vectors without calling
    /// the embedder.
    ///
    /// The caller is responsible for checking that `embedder` is the
    /// model the vectors were produced with.
    pub async fn from_parts(
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(PipelineError::Store(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        let mut dims = embedder.dims();
        for v in &vectors {
            check_dims(&mut dims, v, embedder.model_name())?;
        }
        Self::assemble(
            chunks,
            vectors,
            embedder,
            dims,
            Box::new(InMemoryVectorStore::new()),
        )
        .await
    }

    async fn assemble(
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
        embedder: Arc<dyn Embedder>,
        dims: usize,
        mut store: Box<dyn VectorStore>,
    ) -> Result<Self> {
        let payloads = (0..chunks.len()).collect();
        store.add(vectors, payloads).await?;
        Ok(Self {
            chunks,
            store,
            embedder,
            dims,
        })
    }

    /// Rank indexed chunks by similarity to `text`, most similar first.
    ///
    /// Returns at most `k` entries. A blank query, `k == 0`, or an empty
    /// index yields an empty list without calling the embedder.
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 || self.is_empty() || text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self
            .embedder
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                PipelineError::EmbeddingUnavailable("empty embedding response".to_string())
            })?;
        let mut dims = self.dims;
        check_dims(&mut dims, &query_vec, self.embedder.model_name())?;

        let hits = self.store.search(&query_vec, k).await?;
        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                self.chunks.get(hit.payload).map(|chunk| ScoredChunk {
                    chunk: chunk.clone(),
                    score: hit.score,
                })
            })
            .take(k)
            .collect())
    }

    /// Read back every stored vector, in chunk order.
    pub async fn vectors(&self) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(self.chunks.len());
        for payload in 0..self.chunks.len() {
            let v = self.store.fetch(payload).await?.ok_or_else(|| {
                PipelineError::Store(format!("no vector stored for chunk {}", payload))
            })?;
            out.push(v);
        }
        Ok(out)
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Identifier of the embedding model the index was built with.
    pub fn model(&self) -> &str {
        self.embedder.model_name()
    }

    /// Vector dimensionality; `0` only for an empty index built by an
    /// embedder that does not declare its dimension.
    pub fn dims(&self) -> usize {
        self.dims
    }
}

/// Fix `dims` from the first vector when unknown, then require a match.
fn check_dims(dims: &mut usize, v: &[f32], model: &str) -> Result<()> {
    if v.is_empty() {
        return Err(PipelineError::EmbeddingUnavailable(format!(
            "model '{}' returned an empty vector",
            model
        )));
    }
    if *dims == 0 {
        *dims = v.len();
    } else if v.len() != *dims {
        return Err(PipelineError::EmbeddingUnavailable(format!(
            "model '{}' returned a {}-dim vector, expected {}",
            model,
            v.len(),
            dims
        )));
    }
    Ok(())
}
