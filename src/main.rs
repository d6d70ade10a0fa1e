//! # Pactwatch CLI (`pact`)
//!
//! The `pact` binary wires the pipeline surfaces together: index
//! initialization, batch ingestion, question answering, and the daily
//! report.
//!
//! ## Usage
//!
//! ```bash
//! pact --config ./config/pact.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `pact init` | Create the vector index and its schema |
//! | `pact ingest <dir>` | Load, chunk, embed, and index a directory of contracts |
//! | `pact query "<question>"` | Answer a question with cited sources |
//! | `pact report` | Generate the expiration/conflict report |
//! | `pact status` | Show index location and corpus counts |
//!
//! Report delivery (`pact report --deliver`) and scheduled runs exit 0 on
//! success and non-zero on any unrecovered failure, so a cron wrapper can
//! alert on the exit code alone.

mod analysis;
mod chunker;
mod config;
mod db;
mod embedding;
mod generation;
mod index;
mod ingest;
mod loader;
mod migrate;
mod models;
mod qa;
mod report;

use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::analysis::PatternSet;
use crate::chunker::Chunker;
use crate::config::Config;
use crate::index::SqliteIndex;
use crate::qa::QaEngine;
use crate::report::{ReportSink, WebhookSink};

/// Pactwatch — contract ingestion, retrieval-augmented Q&A, and
/// expiry/conflict monitoring.
#[derive(Parser)]
#[command(
    name = "pact",
    about = "Pactwatch — contract document intelligence",
    version,
    long_about = "Pactwatch ingests contract documents (PDF, DOCX, TXT), indexes them \
    for semantic retrieval, answers natural-language questions with cited sources, and \
    produces a daily report of approaching expirations and cross-document conflicts."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/pact.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the vector index.
    ///
    /// Creates the SQLite index file and its schema at `[index].path`.
    /// Idempotent — running it again is safe.
    Init,

    /// Ingest a directory of contract documents.
    ///
    /// Loads every supported file (pdf, docx, txt), chunks the extracted
    /// text, embeds it when an embedding provider is configured, and
    /// upserts everything into the index. Files that fail extraction are
    /// logged and skipped; an index write failure fails the whole batch.
    Ingest {
        /// Directory containing the upload batch.
        dir: PathBuf,
    },

    /// Ask a question about the indexed contracts.
    ///
    /// Prints the generated answer and a deduplicated source list. Never
    /// fails with a raw fault: on any retrieval or generation error the
    /// answer is a fixed error message.
    Query {
        /// The question to answer.
        question: String,
    },

    /// Generate the expiration/conflict report.
    ///
    /// Scans every indexed chunk for approaching expirations and
    /// conflicting company addresses, prints the report, and optionally
    /// delivers it to the configured notification endpoint.
    Report {
        /// Deliver the report via the `[delivery]` collaborator.
        #[arg(long)]
        deliver: bool,

        /// Pin "today" for the expiration window (YYYY-MM-DD). Defaults
        /// to the current date.
        #[arg(long)]
        as_of: Option<String>,
    },

    /// Show index location and corpus counts.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let index = SqliteIndex::create(
                &cfg.index.path,
                embedding::create_embedder(&cfg.embedding)?,
                cfg.embedding.batch_size,
            )
            .await?;
            index.close().await;
            println!("Index initialized at {}.", cfg.index.path.display());
        }
        Commands::Ingest { dir } => {
            let index = open_index(&cfg).await?;
            let chunker = Chunker::new(&cfg.chunking);

            let summary = ingest::run_ingest(&index, &chunker, &dir).await?;
            if summary.is_empty() {
                println!("No documents processed.");
            } else {
                println!("ingest {}", dir.display());
                println!("  documents processed: {}", summary.documents);
                println!("  chunks indexed: {}", summary.chunks);
                println!("ok");
            }
            index.close().await;
        }
        Commands::Query { question } => {
            let index = open_index(&cfg).await?;
            let generator = generation::create_generator(&cfg.generation)?;
            let engine = QaEngine::new(&index, generator.as_ref(), cfg.retrieval.top_k);

            let result = engine.query(&question).await;
            println!("{}", result.answer.trim());
            if !result.sources.is_empty() {
                println!("\nSources:");
                for source in &result.sources {
                    println!("- {}", source);
                }
            }
            index.close().await;
        }
        Commands::Report { deliver, as_of } => {
            let index = open_index(&cfg).await?;
            let patterns = PatternSet::new();

            let now = Utc::now();
            let today = match as_of {
                Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                    .with_context(|| format!("invalid --as-of date: {}", s))?,
                None => now.date_naive(),
            };

            let text =
                report::generate(&index, &patterns, now, today, cfg.report.window_days).await;
            println!("{}", text);
            index.close().await;

            if deliver {
                let delivery = cfg
                    .delivery
                    .as_ref()
                    .context("report delivery requested but [delivery] is not configured")?;
                let sink = WebhookSink::new(delivery)?;
                let subject = format!(
                    "{} - {}",
                    report::REPORT_TITLE,
                    today.format("%Y-%m-%d")
                );
                sink.deliver(&subject, &text)
                    .await
                    .context("report delivery failed")?;
                info!("report delivered to {}", delivery.to);
                println!("Report delivered.");
            }
        }
        Commands::Status => {
            let opened = SqliteIndex::open(
                &cfg.index.path,
                embedding::create_embedder(&cfg.embedding)?,
                cfg.embedding.batch_size,
            )
            .await?;

            match opened {
                None => {
                    println!(
                        "No index present at {}. Run `pact init` and `pact ingest` first.",
                        cfg.index.path.display()
                    );
                }
                Some(index) => {
                    println!("index: {}", cfg.index.path.display());
                    println!("  documents: {}", index.document_count().await?);
                    println!("  chunks: {}", index.chunk_count().await?);
                    println!("  vectors: {}", index.vector_count().await?);
                    index.close().await;
                }
            }
        }
    }

    Ok(())
}

/// Open the configured index, prompting ingestion when none exists yet.
async fn open_index(cfg: &Config) -> anyhow::Result<SqliteIndex> {
    SqliteIndex::open(
        &cfg.index.path,
        embedding::create_embedder(&cfg.embedding)?,
        cfg.embedding.batch_size,
    )
    .await?
    .with_context(|| {
        format!(
            "no index found at {} — run `pact init` first",
            cfg.index.path.display()
        )
    })
}
