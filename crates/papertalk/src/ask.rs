//! `ptalk ask`: one question against one or more documents.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use papertalk_core::models::Answer;

use crate::config::Config;
use crate::pipeline::{index_path, load_document, start_session};

/// Longest evidence excerpt printed per chunk, in characters.
const EVIDENCE_PREVIEW_CHARS: usize = 200;

pub async fn run_ask(
    config: &Config,
    files: &[PathBuf],
    question: &str,
    index: Option<&Path>,
    rebuild: bool,
    show_evidence: bool,
) -> Result<()> {
    let path = index_path(config, index);
    let index = load_document(config, files, &path, rebuild).await?;
    let mut session = start_session(config, index)?;

    let answer = session.ask(question).await?;
    let mut out = std::io::stdout().lock();
    write_answer(&mut out, &answer, show_evidence)?;
    Ok(())
}

/// Print the answer text, then (optionally) the chunks it was drawn from.
pub fn write_answer(out: &mut impl Write, answer: &Answer, show_evidence: bool) -> Result<()> {
    writeln!(out, "{}", answer.text)?;
    if show_evidence && !answer.evidence.is_empty() {
        writeln!(out)?;
        writeln!(out, "Evidence:")?;
        for (rank, chunk) in answer.evidence.iter().enumerate() {
            write!(out, "  [{}] ", rank + 1)?;
            if let Some(source) = &chunk.source {
                write!(out, "{} ", source)?;
            }
            writeln!(
                out,
                "chunk {} (offset {}): {}",
                chunk.index,
                chunk.start,
                preview(&chunk.text, EVIDENCE_PREVIEW_CHARS)
            )?;
        }
    }
    Ok(())
}

/// Single-line excerpt of at most `max` characters.
fn preview(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max {
        flat
    } else {
        let mut cut: String = flat.chars().take(max).collect();
        cut.push('…');
        cut
    }
}
