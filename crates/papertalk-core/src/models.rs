//! Core data models that flow through the PaperTalk pipeline.
//!
//! A [`Document`] is extracted into normalized text, split into
//! [`Chunk`]s, indexed, and queried. Each question produces an
//! [`Answer`] that is recorded in the conversation as a [`Turn`].

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Source document format, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Text,
    Markdown,
}

impl DocumentFormat {
    /// Map a file extension (with or without the leading dot, any case)
    /// to a format.
    pub fn from_extension(ext: &str) -> Result<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::Docx),
            "txt" => Ok(DocumentFormat::Text),
            "md" | "markdown" => Ok(DocumentFormat::Markdown),
            _ => Err(PipelineError::UnsupportedFormat(ext)),
        }
    }

    /// Resolve the format of a file path from its extension.
    ///
    /// A path with no extension is unsupported.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_extension(&ext)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Text => "txt",
            DocumentFormat::Markdown => "md",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded document: raw bytes plus the format declared by its name.
///
/// Only lives until text extraction; the pipeline never retains it.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub format: DocumentFormat,
    pub bytes: Vec<u8>,
}

impl Document {
    /// Build a document from its file name and contents, resolving the
    /// format from the name's extension.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let name = name.into();
        let format = DocumentFormat::from_path(Path::new(&name))?;
        Ok(Self {
            name,
            format,
            bytes,
        })
    }
}

/// A contiguous slice of normalized document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic UUID derived from the content hash and index.
    pub id: String,
    /// Position in the chunk sequence, contiguous from 0.
    pub index: usize,
    /// Offset of the first character within the normalized text of its
    /// source, in chars.
    pub start: usize,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
    /// Name of the document the chunk came from, when several documents
    /// share one index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// A chunk paired with its similarity to a query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// The synthesizer's reply together with every chunk placed in the prompt.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub evidence: Vec<Chunk>,
}

/// One completed question/answer round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub query: String,
    pub answer: String,
    pub asked_at: DateTime<Utc>,
}
