//! Sliding-window text chunker.
//!
//! Splits normalized document text into overlapping [`Chunk`]s of a fixed
//! target length, measured in characters (Unicode scalar values), so a
//! chunk never ends in the middle of a UTF-8 sequence.
//!
//! Each chunk receives a deterministic UUID derived from its content hash
//! and index, plus a SHA-256 hash of its text.
//!
//! # Algorithm
//!
//! 1. Validate `chunk_size > overlap` (see [`ChunkConfig::validate`]).
//! 2. Emit the window `[start, start + chunk_size)`, clamped to the end of
//!    the text.
//! 3. Advance `start` by `chunk_size - overlap`.
//! 4. Stop after the first window that reaches the end of the text. The
//!    final chunk may be shorter than `chunk_size`; it is always emitted.
//!
//! For a text of `len > overlap` characters this yields
//! `ceil((len - overlap) / (chunk_size - overlap))` chunks. Empty text
//! yields none.
//!
//! # Example
//!
//! ```rust
//! use papertalk_core::chunk::{split_text, ChunkConfig};
//!
//! let config = ChunkConfig { chunk_size: 20, overlap: 5 };
//! let chunks = split_text("A cat sat. A dog ran. Cats and dogs are pets.", &config).unwrap();
//! assert_eq!(chunks.len(), 3);
//! assert_eq!(chunks[0].text, "A cat sat. A dog ran");
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::models::Chunk;

/// Window parameters, both in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
        }
    }
}

impl ChunkConfig {
    /// Reject `chunk_size == 0` and `overlap >= chunk_size`.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.overlap >= self.chunk_size {
            return Err(PipelineError::InvalidChunkConfig {
                chunk_size: self.chunk_size,
                overlap: self.overlap,
            });
        }
        Ok(())
    }

    /// Distance between the starts of consecutive windows.
    pub fn step(&self) -> usize {
        self.chunk_size - self.overlap
    }
}

/// Split `text` into overlapping chunks.
///
/// # Guarantees
///
/// - Chunk indices are contiguous: `0, 1, 2, …, N-1`.
/// - Every chunk but the last is exactly `chunk_size` characters long.
/// - Consecutive chunks share exactly `overlap` characters.
/// - The same input and config always produce the same chunks, ids included.
pub fn split_text(text: &str, config: &ChunkConfig) -> Result<Vec<Chunk>> {
    config.validate()?;

    // Byte offset of every char boundary, including the end of the text.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let len = bounds.len() - 1;

    let mut chunks = Vec::new();
    if len == 0 {
        return Ok(chunks);
    }

    let mut start = 0;
    loop {
        let end = (start + config.chunk_size).min(len);
        let piece = &text[bounds[start]..bounds[end]];
        chunks.push(make_chunk(chunks.len(), start, piece));
        if end == len {
            break;
        }
        start += config.step();
    }

    Ok(chunks)
}

/// Split several documents into one chunk sequence.
///
/// Each `(name, text)` pair is split on its own, so no chunk spans two
/// documents. Indices run contiguously across all sources in the order
/// given; `start` stays relative to the chunk's own document and
/// `source` records its name.
pub fn split_sources(sources: &[(String, String)], config: &ChunkConfig) -> Result<Vec<Chunk>> {
    let mut pooled = Vec::new();
    for (name, text) in sources {
        for mut chunk in split_text(text, config)? {
            let index = pooled.len();
            chunk.id = chunk_id(&chunk.hash, index);
            chunk.index = index;
            chunk.source = Some(name.clone());
            pooled.push(chunk);
        }
    }
    Ok(pooled)
}

/// Rebuild the original text from chunks produced with the given overlap.
///
/// Drops the leading `overlap` characters of every chunk after the first
/// and concatenates the remainder.
pub fn reconstruct(chunks: &[Chunk], overlap: usize) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            out.push_str(&chunk.text);
        } else {
            out.extend(chunk.text.chars().skip(overlap));
        }
    }
    out
}

/// SHA-256 of a string, lowercase hex.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// SHA-256 over every `(name, text)` pair, in order.
///
/// Renaming, reordering, or editing any source changes the hash.
pub fn sources_hash(sources: &[(String, String)]) -> String {
    let mut hasher = Sha256::new();
    for (name, text) in sources {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

fn chunk_id(hash: &str, index: usize) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{}:{}", hash, index).as_bytes()).to_string()
}

fn make_chunk(index: usize, start: usize, text: &str) -> Chunk {
    let hash = content_hash(text);

    Chunk {
        id: chunk_id(&hash, index),
        index,
        start,
        text: text.to_string(),
        hash,
        source: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(chunk_size: usize, overlap: usize) -> ChunkConfig {
        ChunkConfig {
            chunk_size,
            overlap,
        }
    }

    fn expected_count(len: usize, c: &ChunkConfig) -> usize {
        (len - c.overlap).div_ceil(c.step())
    }

    #[test]
    fn test_rejects_zero_chunk_size() {
        let err = split_text("hello", &cfg(0, 0)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidChunkConfig {
                chunk_size: 0,
                overlap: 0
            }
        ));
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_size() {
        assert!(split_text("hello", &cfg(10, 10)).is_err());
        assert!(split_text("hello", &cfg(10, 11)).is_err());
        assert!(split_text("hello", &cfg(10, 9)).is_ok());
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(split_text("", &cfg(20, 5)).unwrap().is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = split_text("Hello, world!", &cfg(500, 50)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
    }

    #[test]
    fn test_cat_and_dog_windows() {
        let text = "A cat sat. A dog ran. Cats and dogs are pets.";
        let chunks = split_text(text, &cfg(20, 5)).unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["A cat sat. A dog ran", "g ran. Cats and dogs", " dogs are pets."]
        );
        assert_eq!(chunks[1].start, 15);
        assert_eq!(reconstruct(&chunks, 5), text);
    }

    #[test]
    fn test_last_chunk_is_kept_when_short() {
        let chunks = split_text("abcdefghijk", &cfg(5, 0)).unwrap();
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcde", "fghij", "k"]);
    }

    #[test]
    fn test_count_matches_boundary_arithmetic() {
        let text: String = (0..997).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        for (size, overlap) in [(1, 0), (7, 3), (20, 5), (100, 99), (500, 50), (997, 10)] {
            let c = cfg(size, overlap);
            let chunks = split_text(&text, &c).unwrap();
            assert_eq!(
                chunks.len(),
                expected_count(text.chars().count(), &c),
                "size={} overlap={}",
                size,
                overlap
            );
            assert_eq!(reconstruct(&chunks, overlap), text);
        }
    }

    #[test]
    fn test_consecutive_chunks_share_overlap() {
        let text = "The quick brown fox jumps over the lazy dog again and again.";
        let chunks = split_text(text, &cfg(12, 4)).unwrap();
        for pair in chunks.windows(2) {
            let tail: String = pair[0].text.chars().skip(8).collect();
            let head: String = pair[1].text.chars().take(4).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──────────────────┐\n│ Hello wörld ✓    │\n└──────────────────┘";
        let chunks = split_text(text, &cfg(7, 2)).unwrap();
        for c in &chunks[..chunks.len() - 1] {
            assert_eq!(c.text.chars().count(), 7);
        }
        assert_eq!(reconstruct(&chunks, 2), text);
    }

    #[test]
    fn test_chunk_indices_contiguous() {
        let text = (0..50)
            .map(|i| format!("Paragraph number {}.", i))
            .collect::<Vec<_>>()
            .join("\n");
        let chunks = split_text(&text, &cfg(40, 10)).unwrap();
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i, "Index mismatch at position {}", i);
            assert_eq!(c.start, i * 30);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha\nBeta\nGamma\nDelta\nEpsilon";
        let c1 = split_text(text, &cfg(8, 3)).unwrap();
        let c2 = split_text(text, &cfg(8, 3)).unwrap();
        assert_eq!(c1, c2);
    }

    fn source(name: &str, text: &str) -> (String, String) {
        (name.to_string(), text.to_string())
    }

    #[test]
    fn test_sources_are_pooled_with_contiguous_indices() {
        let sources = vec![
            source("cats.txt", "A cat sat. A dog ran. Cats and dogs are pets."),
            source("empty.txt", ""),
            source("birds.txt", "A bird sang."),
        ];
        let chunks = split_sources(&sources, &cfg(20, 5)).unwrap();
        assert_eq!(chunks.len(), 4);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
        }
        assert_eq!(chunks[2].source.as_deref(), Some("cats.txt"));
        assert_eq!(chunks[3].source.as_deref(), Some("birds.txt"));
        assert_eq!(chunks[3].start, 0);
        assert_eq!(chunks[3].text, "A bird sang.");
        assert_eq!(reconstruct(&chunks[..3], 5), sources[0].1);
    }

    #[test]
    fn test_same_text_in_two_sources_gets_distinct_ids() {
        let sources = vec![source("a.md", "same words"), source("b.md", "same words")];
        let chunks = split_sources(&sources, &cfg(50, 5)).unwrap();
        assert_eq!(chunks[0].hash, chunks[1].hash);
        assert_ne!(chunks[0].id, chunks[1].id);
    }

    #[test]
    fn test_sources_hash_depends_on_order_and_names() {
        let a = source("a.txt", "alpha");
        let b = source("b.txt", "beta");
        let forward = sources_hash(&[a.clone(), b.clone()]);
        assert_eq!(forward, sources_hash(&[a.clone(), b.clone()]));
        assert_ne!(forward, sources_hash(&[b.clone(), a.clone()]));
        assert_ne!(forward, sources_hash(&[a, source("c.txt", "beta")]));
    }

    #[test]
    fn test_repeated_text_gets_distinct_ids() {
        let chunks = split_text("abababab", &cfg(2, 0)).unwrap();
        assert_eq!(chunks[0].hash, chunks[1].hash);
        assert_ne!(chunks[0].id, chunks[1].id);
    }
}
