//! Error taxonomy for the document Q&A pipeline.
//!
//! Document-load failures ([`PipelineError::UnsupportedFormat`],
//! [`PipelineError::Extraction`], [`PipelineError::InvalidChunkConfig`],
//! and [`PipelineError::EmbeddingUnavailable`] during index construction)
//! abort the whole load. Per-question failures leave the session and its
//! index usable; the caller may simply ask again.

use thiserror::Error;

use crate::models::DocumentFormat;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The document's extension matches no supported extraction strategy.
    #[error("unsupported document format: '{0}' (supported: pdf, docx, txt, md)")]
    UnsupportedFormat(String),

    /// A supported format whose bytes could not be parsed.
    #[error("{format} extraction failed: {message}")]
    Extraction {
        format: DocumentFormat,
        message: String,
    },

    #[error("invalid chunk configuration: chunk_size={chunk_size}, overlap={overlap} (need chunk_size > overlap >= 0)")]
    InvalidChunkConfig { chunk_size: usize, overlap: usize },

    /// The embedding backend could not be reached, loaded, or returned
    /// unusable vectors.
    #[error("embedding backend unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The language model backend failed to produce an answer.
    #[error("answer synthesis failed: {0}")]
    Synthesis(String),

    #[error("vector store error: {0}")]
    Store(String),
}

impl PipelineError {
    /// Whether the same request may succeed if simply retried later.
    ///
    /// Backend outages are retryable; malformed input and configuration
    /// errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::EmbeddingUnavailable(_) | PipelineError::Synthesis(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
