//! # Pactwatch
//!
//! Contract document intelligence: ingest heterogeneous contract files,
//! index them for semantic retrieval, answer questions with cited sources,
//! and flag upcoming expirations and cross-document data conflicts.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ PDF/DOCX/TXT │──▶│ Load + Chunk │──▶│ Vector Index   │
//! │  directory   │   │  + Embed     │   │ (SQLite+BLOBs) │
//! └──────────────┘   └──────────────┘   └───────┬───────┘
//!                                               │
//!                          ┌────────────────────┤
//!                          ▼                    ▼
//!                    ┌──────────┐        ┌────────────┐
//!                    │ QA engine │        │  Analysis   │
//!                    │ (cited)   │        │ + Report    │
//!                    └──────────┘        └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`loader`] | Document loading and text extraction |
//! | [`chunker`] | Overlapping windowed chunking |
//! | [`index`] | Vector index contract and SQLite implementation |
//! | [`embedding`] | Embedding provider boundary |
//! | [`generation`] | Text-generation service boundary |
//! | [`qa`] | Retrieval-augmented question answering |
//! | [`analysis`] | Expiration extraction and conflict detection |
//! | [`report`] | Report composition and delivery boundary |
//! | [`ingest`] | Ingestion pipeline orchestration |

pub mod analysis;
pub mod chunker;
pub mod config;
pub mod db;
pub mod embedding;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod loader;
pub mod migrate;
pub mod models;
pub mod qa;
pub mod report;
