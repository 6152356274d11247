//! Vector similarity search abstraction.
//!
//! The [`VectorStore`] trait is the only thing the embedding index needs
//! from a nearest-neighbor backend, enabling pluggable implementations
//! (brute-force in-memory today, an ANN library or remote service later).
//!
//! Payloads are chunk indices; the index maps them back to chunks.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;

/// A payload ranked by similarity to a query vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub payload: usize,
    /// Backend similarity score; higher is more similar.
    pub score: f32,
}

/// Abstract nearest-neighbor backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add`](VectorStore::add) | Bulk-insert vectors with their payloads |
/// | [`search`](VectorStore::search) | Top-`k` payloads, most similar first |
/// | [`fetch`](VectorStore::fetch) | Read back a stored vector (for persistence) |
/// | [`len`](VectorStore::len) | Number of stored vectors |
///
/// The similarity metric is the backend's choice, but it must suit the
/// embedding space of the vectors it is given.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert `vectors[i]` under `payloads[i]`.
    ///
    /// Fails with [`PipelineError::Store`](crate::error::PipelineError::Store)
    /// when the two slices differ in length.
    async fn add(&mut self, vectors: Vec<Vec<f32>>, payloads: Vec<usize>) -> Result<()>;

    /// Return at most `k` hits, most similar first.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>>;

    /// Return the vector stored under `payload`, if any.
    async fn fetch(&self, payload: usize) -> Result<Option<Vec<f32>>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
