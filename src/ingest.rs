//! Ingestion pipeline orchestration: loader → chunker → index upsert.
//!
//! One upload batch is one logical transaction: a file that fails
//! extraction is skipped without blocking the rest, but if the terminal
//! upsert fails the whole batch is reported failed. No retry happens here;
//! retry policy belongs to the caller.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::chunker::Chunker;
use crate::index::VectorIndex;
use crate::loader;

pub struct IngestSummary {
    pub documents: usize,
    pub chunks: usize,
}

impl IngestSummary {
    pub fn is_empty(&self) -> bool {
        self.documents == 0
    }
}

/// Ingest every supported file under `dir` into the index.
///
/// An empty summary is a valid outcome (nothing ingestible found) that
/// callers must report distinctly from failure.
pub async fn run_ingest(
    index: &dyn VectorIndex,
    chunker: &Chunker,
    dir: &Path,
) -> Result<IngestSummary> {
    info!("loading documents from {}", dir.display());
    let documents = loader::load_documents(dir).context("document loading failed")?;

    if documents.is_empty() {
        info!("no documents processed from {}", dir.display());
        return Ok(IngestSummary {
            documents: 0,
            chunks: 0,
        });
    }

    let chunks = chunker.chunk_documents(&documents);
    info!(
        "chunked {} documents into {} chunks",
        documents.len(),
        chunks.len()
    );

    index
        .upsert(&chunks)
        .await
        .context("indexing batch failed")?;

    Ok(IngestSummary {
        documents: documents.len(),
        chunks: chunks.len(),
    })
}
