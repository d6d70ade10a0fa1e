//! Document loading and text extraction.
//!
//! Scans a directory for supported contract files (PDF, DOCX, TXT) and
//! extracts plain text from each. PDF text is extracted per page and joined
//! with `--- Page N ---` markers so downstream citation can recover page
//! numbers from chunk positions. DOCX text is pulled from the `w:t` runs of
//! `word/document.xml` inside the ZIP container.
//!
//! Extraction failures are per-file: a corrupt file is logged and skipped,
//! never aborting the rest of the batch.

use std::io::Read;
use std::path::Path;

use chrono::Utc;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::models::{Document, FileType};

/// Decompressed size cap for a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
    #[error("extracted text is empty")]
    Empty,
}

/// Load every supported file under `dir` into a [`Document`].
///
/// Files are visited in path order so the result is deterministic. Files
/// with unrecognized extensions are skipped silently; files that fail
/// extraction are logged and skipped. An empty result is a valid outcome
/// (the caller reports "no documents processed" distinctly).
pub fn load_documents(dir: &Path) -> Result<Vec<Document>, ExtractError> {
    if !dir.is_dir() {
        return Err(ExtractError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("document directory not found: {}", dir.display()),
        )));
    }

    let mut documents = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let file_type = match path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(FileType::from_extension)
        {
            Some(ft) => ft,
            None => {
                debug!("skipping unsupported file: {}", path.display());
                continue;
            }
        };

        match extract_file(path, file_type) {
            Ok(content) => {
                let source = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string());
                documents.push(Document {
                    source,
                    file_type,
                    processed_date: Utc::now(),
                    content,
                });
            }
            Err(e) => {
                warn!("failed to extract {}: {}", path.display(), e);
            }
        }
    }

    Ok(documents)
}

/// Extract plain text from a single file. Whitespace-only output counts as
/// a failed extraction so no empty [`Document`] can be produced.
pub fn extract_file(path: &Path, file_type: FileType) -> Result<String, ExtractError> {
    let text = match file_type {
        FileType::Txt => std::fs::read_to_string(path)?,
        FileType::Pdf => extract_pdf(&std::fs::read(path)?)?,
        FileType::Docx => extract_docx(&std::fs::read(path)?)?,
    };
    if text.trim().is_empty() {
        return Err(ExtractError::Empty);
    }
    Ok(text)
}

/// Render the page boundary marker embedded into extracted PDF text.
pub fn page_marker(page: u32) -> String {
    format!("--- Page {} ---", page)
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;

    let mut out = String::new();
    for (i, page) in pages.iter().enumerate() {
        out.push('\n');
        out.push_str(&page_marker(i as u32 + 1));
        out.push('\n');
        out.push_str(page);
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;

    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::Docx(e.to_string()))?;

    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    collect_text_runs(&doc_xml)
}

/// Walk `word/document.xml` collecting `w:t` runs, one line per `w:p`
/// paragraph.
fn collect_text_runs(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_text = true;
                }
            }
            Ok(quick_xml::events::Event::Text(t)) if in_text => {
                out.push_str(t.unescape().unwrap_or_default().as_ref());
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if !out.ends_with('\n') {
                        out.push('\n');
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
