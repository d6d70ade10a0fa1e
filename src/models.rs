//! Core data types flowing through the ingestion, retrieval, and analysis
//! pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Recognized input formats. Files with any other extension are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
    Txt,
}

impl FileType {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(FileType::Pdf),
            "docx" => Some(FileType::Docx),
            "txt" => Some(FileType::Txt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Docx => "docx",
            FileType::Txt => "txt",
        }
    }
}

/// A unit of ingested content: the extracted text of one source file plus
/// provenance metadata. Immutable after extraction. A file that fails
/// extraction produces no `Document` at all, so `content` is never empty.
#[derive(Debug, Clone)]
pub struct Document {
    pub source: String,
    pub file_type: FileType,
    pub processed_date: DateTime<Utc>,
    pub content: String,
}

/// A contiguous slice of a document's text, the unit of indexing and
/// retrieval. Carries the parent document's provenance forward.
///
/// `id` and `hash` are derived deterministically from the chunk's source,
/// position, and text, so re-ingesting an unchanged file upserts the same
/// rows in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub source: String,
    pub file_type: FileType,
    /// Page the chunk starts on, when the source format has pages.
    pub page: Option<u32>,
    pub chunk_index: i64,
    pub text: String,
    pub hash: String,
    pub processed_date: DateTime<Utc>,
}

/// Citation unit: a document name plus an optional page number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SourceRef {
    pub document: String,
    pub page: Option<u32>,
}

impl std::fmt::Display for SourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.page {
            Some(p) => write!(f, "{} (Page {})", self.document, p),
            None => write!(f, "{}", self.document),
        }
    }
}

/// Answer to one question: generated text, deduplicated citations in
/// first-seen order, and the raw retrieved chunks.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub relevant_documents: Vec<Chunk>,
}

/// A contract expiring within the report window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpirationFinding {
    pub document: String,
    pub date: NaiveDate,
    pub days_until_expiration: i64,
}

/// A company recorded with more than one distinct address across the corpus.
///
/// `addresses` maps each distinct address to the documents it appeared in;
/// a `BTreeMap` keeps report output stable across runs. `documents` is the
/// deduplicated set of all involved documents, first-seen order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictFinding {
    pub company: String,
    pub issue: String,
    pub addresses: BTreeMap<String, Vec<String>>,
    pub documents: Vec<String>,
}
