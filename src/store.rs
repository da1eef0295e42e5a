//! Persistent vector store over SQLite.
//!
//! The store is the system of record for documents, chunks, and their
//! embedding vectors, and the only writer of all three. Chunk rowids are
//! assigned by SQLite and reused unmodified as the vector's join key, so a
//! chunk row and its vector row are created inside one transaction and
//! deleted together via cascade — neither is ever observable without the
//! other.
//!
//! Vectors are stored as little-endian `f32` BLOBs in a dedicated
//! `chunk_vectors` table keyed by chunk id. Similarity search over-fetches
//! candidates from that table before joining to `chunks` and `documents`:
//! the candidate set may still reference rows that a concurrent delete has
//! removed, and the join is what filters them out. The over-fetch is a
//! correctness safeguard, not an optimization.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::models::{Document, SearchResult, StoredChunk};

/// Candidate multiplier applied to `k` before the join.
const SEARCH_OVERFETCH_FACTOR: usize = 5;
/// Minimum candidate count regardless of `k`.
const SEARCH_OVERFETCH_FLOOR: usize = 10;

pub struct VectorStore {
    pool: SqlitePool,
    dims: usize,
}

impl VectorStore {
    /// Open (or create) the store at `path` and run schema migrations.
    ///
    /// `dims` fixes the vector dimensionality for the lifetime of the
    /// deployment; every insert and search is validated against it.
    pub async fn connect(path: &Path, dims: usize) -> Result<Self> {
        if dims == 0 {
            return Err(Error::InvalidInput(
                "vector dimensionality must be > 0".to_string(),
            ));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Storage(sqlx::Error::Io(e)))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(Error::Storage)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool, dims };
        store.run_migrations().await?;
        Ok(store)
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                mime_type   TEXT NOT NULL,
                byte_size   INTEGER NOT NULL,
                storage_key TEXT NOT NULL UNIQUE,
                created_at  INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                text        TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunk_vectors (
                chunk_id    INTEGER PRIMARY KEY REFERENCES chunks(id) ON DELETE CASCADE,
                document_id TEXT NOT NULL,
                embedding   BLOB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document_id ON chunks(document_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Register document metadata created at upload time.
    ///
    /// Fails with [`Error::Conflict`] when the storage key (or id) already
    /// exists.
    pub async fn insert_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, name, mime_type, byte_size, storage_key, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.name)
        .bind(&doc.mime_type)
        .bind(doc.byte_size)
        .bind(&doc.storage_key)
        .bind(doc.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Error::Conflict(format!(
                "document with id '{}' or storage key '{}' already exists",
                doc.id, doc.storage_key
            )),
            _ => Error::Storage(e),
        })?;

        Ok(())
    }

    pub async fn get_document(&self, document_id: &str) -> Result<Document> {
        let row = sqlx::query(
            "SELECT id, name, mime_type, byte_size, storage_key, created_at
             FROM documents WHERE id = ?",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| document_from_row(&r))
            .ok_or_else(|| Error::NotFound(format!("document '{}' not found", document_id)))
    }

    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, name, mime_type, byte_size, storage_key, created_at
             FROM documents ORDER BY created_at DESC, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(document_from_row).collect())
    }

    /// Chunks of one document in insertion (sequence) order.
    pub async fn chunks_for_document(&self, document_id: &str) -> Result<Vec<StoredChunk>> {
        let rows = sqlx::query(
            "SELECT id, document_id, text FROM chunks WHERE document_id = ? ORDER BY id",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| StoredChunk {
                id: r.get("id"),
                document_id: r.get("document_id"),
                text: r.get("text"),
            })
            .collect())
    }

    /// Store a batch of chunk/vector pairs for one document, atomically.
    ///
    /// Either every pair is durably stored or none is: any failure inside
    /// the batch rolls back the whole transaction. Chunk rowids are
    /// assigned by SQLite and reused as the vector's key. Vectors whose
    /// length differs from the configured dimensionality are rejected
    /// before the transaction starts.
    pub async fn insert_chunks_with_vectors(
        &self,
        document_id: &str,
        pairs: &[(String, Vec<f32>)],
    ) -> Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }

        for (i, (_, vector)) in pairs.iter().enumerate() {
            if vector.len() != self.dims {
                return Err(Error::InvalidInput(format!(
                    "vector {} has {} dimensions, expected {}",
                    i,
                    vector.len(),
                    self.dims
                )));
            }
        }

        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM documents WHERE id = ?")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await?;
        if exists.is_none() {
            return Err(Error::NotFound(format!(
                "document '{}' not found",
                document_id
            )));
        }

        let mut tx = self.pool.begin().await?;

        for (text, vector) in pairs {
            let insert = sqlx::query("INSERT INTO chunks (document_id, text) VALUES (?, ?)")
                .bind(document_id)
                .bind(text)
                .execute(&mut *tx)
                .await?;
            let chunk_id = insert.last_insert_rowid();

            sqlx::query(
                "INSERT INTO chunk_vectors (chunk_id, document_id, embedding) VALUES (?, ?, ?)",
            )
            .bind(chunk_id)
            .bind(document_id)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Nearest-neighbor search: at most `k` results, ascending distance,
    /// ties broken by chunk id.
    ///
    /// Candidates are over-fetched from the vector table (a multiple of
    /// `k` with a floor) and then joined to `chunks` and `documents`; rows
    /// the join cannot resolve are dropped before the final truncation.
    pub async fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if query_vector.len() != self.dims {
            return Err(Error::InvalidInput(format!(
                "query vector has {} dimensions, expected {}",
                query_vector.len(),
                self.dims
            )));
        }

        if k == 0 {
            return Ok(Vec::new());
        }

        let fetch_k = (k * SEARCH_OVERFETCH_FACTOR).max(SEARCH_OVERFETCH_FLOOR);

        let rows = sqlx::query("SELECT chunk_id, embedding FROM chunk_vectors")
            .fetch_all(&self.pool)
            .await?;

        let mut candidates: Vec<(i64, f64)> = rows
            .iter()
            .map(|row| {
                let chunk_id: i64 = row.get("chunk_id");
                let blob: Vec<u8> = row.get("embedding");
                let vector = blob_to_vec(&blob);
                (chunk_id, cosine_distance(query_vector, &vector))
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        candidates.truncate(fetch_k);

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        // Join candidates to their chunk text and document name. Candidates
        // whose chunk or document has been deleted fall out here.
        let placeholders = vec!["?"; candidates.len()].join(", ");
        let sql = format!(
            "SELECT c.id AS chunk_id, c.document_id, c.text, d.name AS document_name
             FROM chunks c
             JOIN documents d ON d.id = c.document_id
             WHERE c.id IN ({})",
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for (chunk_id, _) in &candidates {
            query = query.bind(*chunk_id);
        }
        let joined = query.fetch_all(&self.pool).await?;

        let mut by_id = std::collections::HashMap::with_capacity(joined.len());
        for row in &joined {
            let chunk_id: i64 = row.get("chunk_id");
            by_id.insert(chunk_id, row);
        }

        let mut results = Vec::with_capacity(k);
        for (chunk_id, distance) in &candidates {
            if let Some(row) = by_id.get(chunk_id) {
                results.push(SearchResult {
                    chunk_id: *chunk_id,
                    document_id: row.get("document_id"),
                    text: row.get("text"),
                    distance: *distance,
                    document_name: row.get("document_name"),
                });
                if results.len() == k {
                    break;
                }
            }
        }

        Ok(results)
    }

    /// Delete a document and everything it owns.
    ///
    /// Returns the total number of rows removed (document, chunks, and
    /// vectors). Deleting an unknown id removes nothing and returns 0.
    pub async fn delete_document(&self, document_id: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        // Deleted explicitly rather than through the cascade so the count
        // reflects every row removed.
        let vectors = sqlx::query("DELETE FROM chunk_vectors WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let chunks = sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let documents = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(vectors + chunks + documents)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn document_from_row(row: &sqlx::sqlite::SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        name: row.get("name"),
        mime_type: row.get("mime_type"),
        byte_size: row.get("byte_size"),
        storage_key: row.get("storage_key"),
        created_at: row.get("created_at"),
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
pub fn vec_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for &v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine distance between two vectors: `1 - cos(a, b)`, so identical
/// direction is 0 and lower means more similar. Mismatched or empty
/// vectors get the maximum distance instead of a panic.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 2.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f64::EPSILON {
        return 2.0;
    }

    1.0 - dot / denom
}
