//! Top-k chunk retrieval.
//!
//! Wraps [`Index::query`] and drops the similarity scores: the answer
//! synthesizer only ever sees the chunks, in rank order.

use tracing::debug;

use crate::error::Result;
use crate::index::Index;
use crate::models::Chunk;

/// Number of chunks retrieved per question unless configured otherwise.
pub const DEFAULT_TOP_K: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct Retriever {
    k: usize,
    min_score: Option<f32>,
}

impl Default for Retriever {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_K)
    }
}

impl Retriever {
    pub fn new(k: usize) -> Self {
        Self { k, min_score: None }
    }

    /// Drop hits whose similarity is below `min_score`.
    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Return at most `k` chunks from `index`, most similar first.
    ///
    /// Fewer than `k` chunks come back when the index is smaller than `k`
    /// or the score floor filters some out; a blank query returns none.
    pub async fn retrieve(&self, index: &Index, query: &str) -> Result<Vec<Chunk>> {
        let scored = index.query(query, self.k).await?;
        let chunks: Vec<Chunk> = scored
            .into_iter()
            .filter(|s| match self.min_score {
                Some(floor) => s.score >= floor,
                None => true,
            })
            .map(|s| s.chunk)
            .collect();
        debug!(k = self.k, hits = chunks.len(), "retrieved chunks");
        Ok(chunks)
    }
}
