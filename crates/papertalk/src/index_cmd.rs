//! `ptalk index`: extract, chunk, embed, and save one index over the
//! given documents.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::config::Config;
use crate::pipeline::{index_path, load_document};

pub async fn run_index(config: &Config, files: &[PathBuf], index: Option<&Path>) -> Result<()> {
    let path = index_path(config, index);
    let index = load_document(config, files, &path, true).await?;
    println!(
        "Indexed {}: {} chunks, model {} ({} dims) -> {}",
        display_names(files),
        index.len(),
        index.model(),
        index.dims(),
        path.display()
    );
    Ok(())
}

/// Comma-separated file names for status lines.
pub(crate) fn display_names(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|f| f.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
