//! Core data models used throughout ragstore.
//!
//! These types represent the documents, chunks, and search results that flow
//! through the ingestion and retrieval pipeline.

/// Document metadata stored in SQLite.
///
/// The raw bytes live in external blob storage under `storage_key`; the
/// store only keeps the pointer and never derives anything from it.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub byte_size: i64,
    /// Opaque key into externally-owned blob storage. Unique per document.
    pub storage_key: String,
    /// Unix seconds at upload time.
    pub created_at: i64,
}

/// A chunk row as persisted, with its store-assigned rowid.
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: i64,
    pub document_id: String,
    pub text: String,
}

/// One ranked result from the similarity search, joined to its source
/// document. Lower `distance` means more similar.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk_id: i64,
    pub document_id: String,
    pub text: String,
    pub distance: f64,
    pub document_name: String,
}
