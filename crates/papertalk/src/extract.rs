//! Multi-format text extraction (PDF, DOCX, plain text, Markdown).
//!
//! The strategy is picked from the document's file extension; every
//! strategy's output goes through
//! [`normalize_text`](papertalk_core::normalize::normalize_text), so callers
//! always receive trimmed lines with blank lines removed. Extraction only
//! reads the document.

use std::io::Read;
use std::path::Path;

use papertalk_core::models::{Document, DocumentFormat};
use papertalk_core::normalize::normalize_text;
use papertalk_core::{PipelineError, Result};
use quick_xml::events::Event;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extract normalized UTF-8 text from a document.
///
/// # Errors
///
/// - [`PipelineError::Extraction`] when PDF or DOCX bytes cannot be parsed.
///
/// Unsupported extensions never reach this function: they are rejected
/// when the [`Document`] is created.
pub fn extract(document: &Document) -> Result<String> {
    let raw = match document.format {
        DocumentFormat::Pdf => extract_pdf(&document.bytes)?,
        DocumentFormat::Docx => extract_docx(&document.bytes)?,
        DocumentFormat::Text | DocumentFormat::Markdown => decode_lossy(&document.bytes),
    };
    Ok(normalize_text(&raw))
}

/// Read a file from disk and extract it.
///
/// PDF parsing is CPU-bound, so the work runs on the blocking pool.
pub async fn extract_file(path: &Path) -> anyhow::Result<String> {
    // Reject unsupported formats before touching the file.
    DocumentFormat::from_path(path)?;
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let document = Document::new(path.to_string_lossy(), bytes)?;
    let format = document.format;
    let text = tokio::task::spawn_blocking(move || extract(&document)).await??;
    tracing::info!(
        path = %path.display(),
        format = %format,
        chars = text.chars().count(),
        "extracted document text"
    );
    Ok(text)
}

fn extraction_error(format: DocumentFormat, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Extraction {
        format,
        message: e.to_string(),
    }
}

/// Decode UTF-8, replacing invalid sequences with U+FFFD.
fn decode_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_start_matches('\u{feff}')
        .to_string()
}

fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| extraction_error(DocumentFormat::Pdf, e))?;
    Ok(tag_pages(&pages))
}

/// Per-page text in page order, each non-empty page tagged `[Page N]`
/// (1-based, counting blank pages) and separated by a blank line.
fn tag_pages(pages: &[String]) -> String {
    let tagged: Vec<String> = pages
        .iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| format!("[Page {}]\n{}", i + 1, text))
        .collect();
    tagged.join("\n\n")
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>> {
    let entry = archive
        .by_name(name)
        .map_err(|e| extraction_error(DocumentFormat::Docx, format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| extraction_error(DocumentFormat::Docx, e))?;
    if out.len() as u64 >= max_bytes {
        return Err(extraction_error(
            DocumentFormat::Docx,
            format!("ZIP entry {} exceeds size limit ({} bytes)", name, max_bytes),
        ));
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| extraction_error(DocumentFormat::Docx, e))?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    docx_body_text(&xml)
}

/// Body paragraphs in document order, then every table row with its cells
/// joined by tabs.
///
/// Paragraphs inside table cells belong to the cell (joined by newlines),
/// not to the body paragraph list. Nested tables are folded into the text
/// of the enclosing cell.
fn docx_body_text(xml: &[u8]) -> Result<String> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut paragraphs: Vec<String> = Vec::new();
    let mut rows: Vec<String> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell_paragraphs: Vec<String> = Vec::new();
    let mut para = String::new();
    let mut table_depth = 0usize;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"p" => para.clear(),
                b"tbl" => table_depth += 1,
                b"tr" if table_depth == 1 => row.clear(),
                b"tc" if table_depth == 1 => cell_paragraphs.clear(),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => para.push('\t'),
                b"br" | b"cr" => para.push('\n'),
                b"p" => {
                    if table_depth == 0 {
                        paragraphs.push(String::new());
                    } else {
                        cell_paragraphs.push(String::new());
                    }
                }
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| extraction_error(DocumentFormat::Docx, e))?;
                para.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let text = std::mem::take(&mut para);
                    if table_depth == 0 {
                        paragraphs.push(text);
                    } else {
                        cell_paragraphs.push(text);
                    }
                }
                b"tc" if table_depth == 1 => {
                    row.push(cell_paragraphs.join("\n"));
                    cell_paragraphs.clear();
                }
                b"tr" if table_depth == 1 => rows.push(row.join("\t")),
                b"tbl" => table_depth = table_depth.saturating_sub(1),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(extraction_error(DocumentFormat::Docx, e)),
            _ => {}
        }
        buf.clear();
    }

    paragraphs.extend(rows);
    Ok(paragraphs.join("\n"))
}
