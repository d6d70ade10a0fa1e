//! Vector index contract and its SQLite-backed implementation.
//!
//! The pipeline depends on the narrow [`VectorIndex`] trait: incremental
//! `upsert`, nearest-neighbor `similarity_search`, and bulk `get_all` for
//! the analysis pass. [`SqliteIndex`] is the shipped collaborator: chunks
//! in a `chunks` table, embeddings as little-endian f32 BLOBs in
//! `chunk_vectors`, similarity computed brute-force in Rust.
//!
//! Reload semantics: [`SqliteIndex::open`] returns `Ok(None)` when no index
//! file exists at the configured path (empty corpus, prompt ingestion) and
//! an error when a file exists but cannot be read as an index (broken
//! store). An index that opens but holds zero chunks is simply empty.

use std::path::Path;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use crate::db;
use crate::embedding::{self, Embedder};
use crate::migrate;
use crate::models::{Chunk, FileType};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("index write failed: {0}")]
    Write(String),
    #[error("index unavailable: {0}")]
    Unavailable(String),
    #[error("index read failed: {0}")]
    Read(String),
}

/// Narrow storage contract the pipeline consumes.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Persist chunks incrementally. Previously stored chunks survive;
    /// re-upserting an identical chunk replaces it in place.
    async fn upsert(&self, chunks: &[Chunk]) -> Result<(), IndexError>;

    /// The `k` chunks whose embeddings are nearest the query's, nearest
    /// first, ties broken by insertion order.
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Chunk>, IndexError>;

    /// Every stored chunk in insertion order. Reflects all prior upserts.
    async fn get_all(&self) -> Result<Vec<Chunk>, IndexError>;
}

pub struct SqliteIndex {
    pool: SqlitePool,
    embedder: Box<dyn Embedder>,
    batch_size: usize,
}

impl SqliteIndex {
    /// Create (or re-open) the index at `path`, building the schema.
    /// Idempotent.
    pub async fn create(
        path: &Path,
        embedder: Box<dyn Embedder>,
        batch_size: usize,
    ) -> anyhow::Result<Self> {
        let pool = db::connect(path, true).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self {
            pool,
            embedder,
            batch_size,
        })
    }

    /// Reconstruct a handle to a previously persisted index.
    ///
    /// Returns `Ok(None)` when nothing exists at `path`; an error when a
    /// file exists but does not hold a usable index.
    pub async fn open(
        path: &Path,
        embedder: Box<dyn Embedder>,
        batch_size: usize,
    ) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let pool = db::connect(path, false).await?;
        let has_schema: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='chunks'",
        )
        .fetch_one(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("index at {} is not readable: {}", path.display(), e))?;

        if !has_schema {
            anyhow::bail!(
                "index at {} exists but holds no schema; recreate it with `pact init`",
                path.display()
            );
        }

        Ok(Some(Self {
            pool,
            embedder,
            batch_size,
        }))
    }

    pub async fn chunk_count(&self) -> anyhow::Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn document_count(&self) -> anyhow::Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(DISTINCT source) FROM chunks")
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn vector_count(&self) -> anyhow::Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
            .fetch_one(&self.pool)
            .await?)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Embed chunks that have no stored vector yet. Non-fatal: an
    /// embedding-service failure leaves the chunks stored and searchable
    /// later, it does not fail the batch.
    async fn embed_missing(&self, chunks: &[Chunk]) -> Result<(), IndexError> {
        if self.embedder.model_name() == "disabled" {
            return Ok(());
        }

        let mut pending: Vec<&Chunk> = Vec::new();
        for chunk in chunks {
            let exists: Option<String> =
                sqlx::query_scalar("SELECT chunk_id FROM chunk_vectors WHERE chunk_id = ?")
                    .bind(&chunk.id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| IndexError::Write(e.to_string()))?;
            if exists.is_none() {
                pending.push(chunk);
            }
        }

        for batch in pending.chunks(self.batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            match self.embedder.embed(&texts).await {
                Ok(vectors) => {
                    for (chunk, vector) in batch.iter().zip(vectors.iter()) {
                        let blob = embedding::vec_to_blob(vector);
                        sqlx::query(
                            r#"
                            INSERT INTO chunk_vectors (chunk_id, embedding, model, dims)
                            VALUES (?, ?, ?, ?)
                            ON CONFLICT(chunk_id) DO UPDATE SET
                                embedding = excluded.embedding,
                                model = excluded.model,
                                dims = excluded.dims
                            "#,
                        )
                        .bind(&chunk.id)
                        .bind(&blob)
                        .bind(self.embedder.model_name())
                        .bind(self.embedder.dims() as i64)
                        .execute(&self.pool)
                        .await
                        .map_err(|e| IndexError::Write(e.to_string()))?;
                    }
                }
                Err(e) => {
                    warn!("embedding batch failed, vectors left pending: {}", e);
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn upsert(&self, chunks: &[Chunk]) -> Result<(), IndexError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IndexError::Write(e.to_string()))?;

        for chunk in chunks {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, source, file_type, page, chunk_index, text, hash, processed_date)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    page = excluded.page,
                    text = excluded.text,
                    hash = excluded.hash,
                    processed_date = excluded.processed_date
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.source)
            .bind(chunk.file_type.as_str())
            .bind(chunk.page.map(|p| p as i64))
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(chunk.processed_date.timestamp())
            .execute(&mut *tx)
            .await
            .map_err(|e| IndexError::Write(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| IndexError::Write(e.to_string()))?;

        self.embed_missing(chunks).await?;

        info!("upserted {} chunks into index", chunks.len());
        Ok(())
    }

    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Chunk>, IndexError> {
        let query_vec = self
            .embedder
            .embed(&[query.to_string()])
            .await
            .map_err(|e| IndexError::Unavailable(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| IndexError::Unavailable("empty embedding response".to_string()))?;

        // Insertion order here + a stable sort below = deterministic
        // tie-breaking by insertion order.
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.source, c.file_type, c.page, c.chunk_index, c.text, c.hash,
                   c.processed_date, v.embedding
            FROM chunk_vectors v
            JOIN chunks c ON c.id = v.chunk_id
            ORDER BY c.rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexError::Read(e.to_string()))?;

        let mut scored: Vec<(f32, Chunk)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = embedding::blob_to_vec(&blob);
                let score = embedding::cosine_similarity(&query_vec, &vec);
                (score, row_to_chunk(row))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored.into_iter().map(|(_, c)| c).collect())
    }

    async fn get_all(&self) -> Result<Vec<Chunk>, IndexError> {
        let rows = sqlx::query(
            r#"
            SELECT id, source, file_type, page, chunk_index, text, hash, processed_date
            FROM chunks
            ORDER BY rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexError::Read(e.to_string()))?;

        Ok(rows.iter().map(row_to_chunk).collect())
    }
}

fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Chunk {
    let file_type: String = row.get("file_type");
    let page: Option<i64> = row.get("page");
    let processed: i64 = row.get("processed_date");

    Chunk {
        id: row.get("id"),
        source: row.get("source"),
        file_type: FileType::from_extension(&file_type).unwrap_or(FileType::Txt),
        page: page.map(|p| p as u32),
        chunk_index: row.get("chunk_index"),
        text: row.get("text"),
        hash: row.get("hash"),
        processed_date: chrono::DateTime::from_timestamp(processed, 0).unwrap_or_default(),
    }
}
