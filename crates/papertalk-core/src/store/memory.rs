//! In-memory [`VectorStore`] implementation.
//!
//! Vector search is brute-force cosine similarity over all stored vectors.
//! Ties are broken by payload ascending so rankings are reproducible.

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::{PipelineError, Result};

use super::{SearchHit, VectorStore};

struct StoredVector {
    payload: usize,
    vector: Vec<f32>,
}

/// Brute-force cosine store; the default backend of
/// [`Index`](crate::index::Index).
#[derive(Default)]
pub struct InMemoryVectorStore {
    vectors: Vec<StoredVector>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&mut self, vectors: Vec<Vec<f32>>, payloads: Vec<usize>) -> Result<()> {
        if vectors.len() != payloads.len() {
            return Err(PipelineError::Store(format!(
                "{} vectors but {} payloads",
                vectors.len(),
                payloads.len()
            )));
        }
        self.vectors.extend(
            vectors
                .into_iter()
                .zip(payloads)
                .map(|(vector, payload)| StoredVector { payload, vector }),
        );
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let mut hits: Vec<SearchHit> = self
            .vectors
            .iter()
            .map(|sv| SearchHit {
                payload: sv.payload,
                score: cosine_similarity(query, &sv.vector),
            })
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.payload.cmp(&b.payload))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn fetch(&self, payload: usize) -> Result<Option<Vec<f32>>> {
        Ok(self
            .vectors
            .iter()
            .find(|sv| sv.payload == payload)
            .map(|sv| sv.vector.clone()))
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }
}
