//! Persisting a built [`Index`] to SQLite so a document is only embedded
//! once.
//!
//! A saved index carries the identity of everything that produced it
//! ([`IndexMeta`]): the embedding provider and model, its dimension, the
//! chunking parameters, and a hash of the named source texts. [`StoredIndex::matches`]
//! tells the caller whether the saved vectors are still valid for the
//! current document and configuration.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

use papertalk_core::chunk::ChunkConfig;
use papertalk_core::embedding::{blob_to_vec, vec_to_blob, Embedder};
use papertalk_core::index::Index;
use papertalk_core::models::Chunk;

use crate::db;

/// What an index was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMeta {
    /// Embedding provider name from `[embedding].provider`.
    pub provider: String,
    pub model: String,
    /// `0` when the model's dimension was unknown and the index is empty.
    pub dims: usize,
    pub chunk_size: usize,
    pub overlap: usize,
    /// Hash of the named normalized texts, see
    /// [`sources_hash`](papertalk_core::chunk::sources_hash).
    pub source_hash: String,
}

impl IndexMeta {
    pub fn new(
        provider: &str,
        model: &str,
        dims: usize,
        chunking: &ChunkConfig,
        source_hash: String,
    ) -> Self {
        Self {
            provider: provider.to_string(),
            model: model.to_string(),
            dims,
            chunk_size: chunking.chunk_size,
            overlap: chunking.overlap,
            source_hash,
        }
    }

    fn entries(&self) -> [(&'static str, String); 6] {
        [
            ("provider", self.provider.clone()),
            ("model", self.model.clone()),
            ("dims", self.dims.to_string()),
            ("chunk_size", self.chunk_size.to_string()),
            ("overlap", self.overlap.to_string()),
            ("source_hash", self.source_hash.clone()),
        ]
    }
}

/// An index as read back from disk.
#[derive(Debug, Clone)]
pub struct StoredIndex {
    pub meta: IndexMeta,
    pub chunks: Vec<Chunk>,
    pub vectors: Vec<Vec<f32>>,
}

impl StoredIndex {
    /// Whether this saved index was built from the same sources, chunking,
    /// and embedding provider and model as `expected`.
    ///
    /// Dimensions are only compared when both sides know them.
    pub fn matches(&self, expected: &IndexMeta) -> bool {
        let dims_agree =
            self.meta.dims == 0 || expected.dims == 0 || self.meta.dims == expected.dims;
        self.meta.provider == expected.provider
            && self.meta.model == expected.model
            && self.meta.chunk_size == expected.chunk_size
            && self.meta.overlap == expected.overlap
            && self.meta.source_hash == expected.source_hash
            && dims_agree
    }

    /// Rebuild a queryable [`Index`] without calling the embedder.
    pub async fn into_index(self, embedder: Arc<dyn Embedder>) -> Result<Index> {
        Ok(Index::from_parts(self.chunks, self.vectors, embedder).await?)
    }
}

/// Replace whatever is stored at `path` with `index`, in one transaction.
pub async fn save_index(path: &Path, index: &Index, meta: &IndexMeta) -> Result<()> {
    let vectors = index.vectors().await?;
    let pool = db::connect(path)
        .await
        .with_context(|| format!("Failed to open index database: {}", path.display()))?;
    write_index(&pool, index.chunks(), &vectors, meta).await?;
    pool.close().await;

    tracing::info!(
        path = %path.display(),
        model = %meta.model,
        dims = meta.dims,
        entries = index.len(),
        "saved index"
    );
    Ok(())
}

async fn write_index(
    pool: &SqlitePool,
    chunks: &[Chunk],
    vectors: &[Vec<f32>],
    meta: &IndexMeta,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM chunk_vectors")
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM index_meta")
        .execute(&mut *tx)
        .await?;

    for (key, value) in meta.entries() {
        sqlx::query("INSERT INTO index_meta (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
    }

    for (chunk, vector) in chunks.iter().zip(vectors) {
        sqlx::query(
            "INSERT INTO chunk_vectors (chunk_index, id, start, text, hash, embedding, source) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(chunk.index as i64)
        .bind(&chunk.id)
        .bind(chunk.start as i64)
        .bind(&chunk.text)
        .bind(&chunk.hash)
        .bind(vec_to_blob(vector))
        .bind(chunk.source.as_deref())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

/// Read the index saved at `path`.
///
/// Returns `None` when the file does not exist or holds no index, and an
/// error when it is not a readable index database.
pub async fn load_index(path: &Path) -> Result<Option<StoredIndex>> {
    if !path.exists() {
        return Ok(None);
    }
    let pool = db::connect(path)
        .await
        .with_context(|| format!("Failed to open index database: {}", path.display()))?;
    let stored = read_index(&pool).await;
    pool.close().await;

    let stored = stored?;
    if let Some(stored) = &stored {
        tracing::info!(
            path = %path.display(),
            model = %stored.meta.model,
            dims = stored.meta.dims,
            entries = stored.chunks.len(),
            "loaded saved index"
        );
    }
    Ok(stored)
}

async fn read_index(pool: &SqlitePool) -> Result<Option<StoredIndex>> {
    let rows = sqlx::query("SELECT key, value FROM index_meta")
        .fetch_all(pool)
        .await?;
    let lookup = |name: &str| {
        rows.iter()
            .find(|r| r.get::<String, _>("key") == name)
            .map(|r| r.get::<String, _>("value"))
    };

    let Some(model) = lookup("model") else {
        return Ok(None);
    };
    let number = |name: &str| -> Result<usize> {
        lookup(name)
            .with_context(|| format!("index_meta is missing '{}'", name))?
            .parse::<usize>()
            .with_context(|| format!("index_meta '{}' is not a number", name))
    };
    let meta = IndexMeta {
        provider: lookup("provider").unwrap_or_default(),
        model,
        dims: number("dims")?,
        chunk_size: number("chunk_size")?,
        overlap: number("overlap")?,
        source_hash: lookup("source_hash").unwrap_or_default(),
    };

    let rows = sqlx::query(
        "SELECT chunk_index, id, start, text, hash, embedding, source FROM chunk_vectors ORDER BY chunk_index",
    )
    .fetch_all(pool)
    .await?;

    let mut chunks = Vec::with_capacity(rows.len());
    let mut vectors = Vec::with_capacity(rows.len());
    for row in rows {
        let index: i64 = row.get("chunk_index");
        let start: i64 = row.get("start");
        let blob: Vec<u8> = row.get("embedding");
        chunks.push(Chunk {
            id: row.get("id"),
            index: index as usize,
            start: start as usize,
            text: row.get("text"),
            hash: row.get("hash"),
            source: row.get("source"),
        });
        vectors.push(blob_to_vec(&blob));
    }

    Ok(Some(StoredIndex {
        meta,
        chunks,
        vectors,
    }))
}

/// Delete the database at `path` along with its WAL side files, so an
/// unreadable index can be written from scratch.
pub async fn discard_index(path: &Path) -> Result<()> {
    let mut targets = vec![path.to_path_buf()];
    for suffix in ["-wal", "-shm"] {
        let mut side = path.as_os_str().to_owned();
        side.push(suffix);
        targets.push(side.into());
    }
    for target in targets {
        match tokio::fs::remove_file(&target).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to remove index file: {}", target.display())
                })
            }
        }
    }
    Ok(())
}
