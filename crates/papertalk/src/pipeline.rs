//! Document loading shared by the `index`, `ask`, and `chat` commands:
//! extract every file, then reuse a matching saved index or build (and
//! save) a fresh one over all of them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use papertalk_core::chunk::{sources_hash, split_sources};
use papertalk_core::embedding::Embedder;
use papertalk_core::index::Index;
use papertalk_core::retrieve::Retriever;
use papertalk_core::session::Session;
use papertalk_core::synth::Synthesizer;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::extract::extract_file;
use crate::generation::create_generator;
use crate::index_store::{discard_index, load_index, save_index, IndexMeta};

/// `--index` if given, otherwise `[index].path`.
pub fn index_path(config: &Config, flag: Option<&Path>) -> PathBuf {
    flag.map(Path::to_path_buf)
        .unwrap_or_else(|| config.index.path.clone())
}

/// Extract `files` and return one [`Index`] over all of them, built with
/// the configured embedder.
///
/// A saved index at `index_path` is reused when it was built from the same
/// files and texts, chunking, and embedding provider and model, and
/// `rebuild` is false. Otherwise the texts are chunked and embedded from
/// scratch and the result saved, replacing whatever was stored before.
/// Nothing is written when extraction or embedding fails.
pub async fn load_document(
    config: &Config,
    files: &[PathBuf],
    index_path: &Path,
    rebuild: bool,
) -> Result<Index> {
    let mut sources = Vec::with_capacity(files.len());
    for file in files {
        let text = extract_file(file).await?;
        sources.push((file.display().to_string(), text));
    }
    let embedder = create_embedder(&config.embedding)?;
    prepare_index(config, &sources, embedder, index_path, rebuild).await
}

/// Index named `(source, text)` pairs, reusing the index saved at
/// `index_path` when it matches.
pub async fn prepare_index(
    config: &Config,
    sources: &[(String, String)],
    embedder: Arc<dyn Embedder>,
    index_path: &Path,
    rebuild: bool,
) -> Result<Index> {
    let chunking = config.chunking.to_chunk_config();
    let expected = IndexMeta::new(
        &config.embedding.provider,
        embedder.model_name(),
        embedder.dims(),
        &chunking,
        sources_hash(sources),
    );

    // Read even when rebuilding, so an unreadable file is replaced rather
    // than failing the save.
    let mut unreadable = false;
    let saved = match load_index(index_path).await {
        Ok(saved) => saved,
        Err(e) => {
            tracing::warn!(
                path = %index_path.display(),
                error = %format!("{:#}", e),
                "saved index is unreadable; rebuilding"
            );
            unreadable = true;
            None
        }
    };
    if let Some(stored) = saved.filter(|_| !rebuild) {
        if stored.matches(&expected) {
            return stored.into_index(embedder).await;
        }
        tracing::info!(
            path = %index_path.display(),
            saved_provider = %stored.meta.provider,
            saved_model = %stored.meta.model,
            provider = %expected.provider,
            model = %expected.model,
            "saved index does not match these documents; rebuilding"
        );
    }

    let chunks = split_sources(sources, &chunking)?;
    tracing::info!(
        documents = sources.len(),
        chunks = chunks.len(),
        chunk_size = chunking.chunk_size,
        overlap = chunking.overlap,
        "split documents"
    );

    let index = Index::build(chunks, embedder, config.embedding.batch_size)
        .await
        .context("Failed to build the embedding index")?;

    if unreadable {
        discard_index(index_path).await?;
    }
    let meta = IndexMeta {
        dims: index.dims(),
        ..expected
    };
    save_index(index_path, &index, &meta).await?;
    Ok(index)
}

/// Wire an index to the configured retriever and generator.
pub fn start_session(config: &Config, index: Index) -> Result<Session> {
    let mut retriever = Retriever::new(config.retrieval.top_k);
    if let Some(min) = config.retrieval.min_score {
        retriever = retriever.with_min_score(min);
    }

    let mut synthesizer = Synthesizer::new(create_generator(&config.generation)?);
    if let Some(turns) = config.generation.max_history_turns {
        synthesizer = synthesizer.with_max_history_turns(turns);
    }

    Ok(Session::new(index, retriever, synthesizer))
}
