//! # ragstore
//!
//! The document-to-vector core of a retrieval-augmented QA backend.
//!
//! Uploaded documents have their text extracted, split into overlapping
//! chunks, embedded into fixed-length vectors, and stored in SQLite.
//! Queries are embedded the same way and answered with the k nearest
//! chunks, joined to their source document metadata.
//!
//! ```text
//! ┌───────────┐   ┌─────────┐   ┌───────────┐   ┌─────────────┐
//! │  extract  │──▶│  chunk  │──▶│ embedding │──▶│ VectorStore │
//! │ (txt/pdf) │   │ windows │   │ (cached)  │   │   SQLite    │
//! └───────────┘   └─────────┘   └───────────┘   └──────┬──────┘
//!                                                      │
//!                      query ──▶ embedding ──▶ search ─┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`chunk`] | Overlapping window chunker |
//! | [`cache`] | TTL-bounded embedding memo |
//! | [`embedding`] | Embedding producer and OpenAI backend |
//! | [`store`] | SQLite vector store |
//! | [`extract`] | Text extraction (plain text, PDF) |
//! | [`ingest`] | Per-document ingestion pipeline |
//! | [`retrieve`] | Retrieval engine |

pub mod cache;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod models;
pub mod retrieve;
pub mod store;
