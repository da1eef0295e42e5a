//! Per-document ingestion pipeline.
//!
//! Orchestrates extraction → chunking → embedding → storage for one
//! document. The failure unit is the whole-document transaction in the
//! vector store; a single fragment's embedding failure is logged and that
//! fragment skipped, never fatal to the document. There is no automatic
//! retry here — retry is the caller's policy decision.

use std::sync::Arc;
use tracing::{info, warn};

use crate::chunk::chunk_text;
use crate::config::ChunkingConfig;
use crate::embedding::EmbeddingProducer;
use crate::error::Result;
use crate::extract::extract_text;
use crate::store::VectorStore;

/// Outcome of one ingestion attempt.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub document_id: String,
    /// Fragments produced by the chunker.
    pub fragments: usize,
    /// Fragments successfully embedded and committed.
    pub stored: usize,
    /// Fragments skipped because their embedding call failed.
    pub skipped: usize,
}

/// Run the full pipeline for one document.
///
/// An empty extraction (e.g. an image-only PDF) terminates successfully
/// with zero chunks stored. Extraction and storage failures propagate;
/// per-fragment embedding failures are recovered locally.
pub async fn ingest_document(
    store: &VectorStore,
    producer: &EmbeddingProducer,
    chunking: &ChunkingConfig,
    document_id: &str,
    bytes: &[u8],
    mime_type: &str,
) -> Result<IngestReport> {
    let text = extract_text(bytes, mime_type)?;

    if text.trim().is_empty() {
        info!(document_id, "no text extracted; nothing to ingest");
        return Ok(IngestReport {
            document_id: document_id.to_string(),
            fragments: 0,
            stored: 0,
            skipped: 0,
        });
    }

    let fragments = chunk_text(&text, chunking.chunk_size, chunking.chunk_overlap);
    let fragment_count = fragments.len();

    let mut pairs: Vec<(String, Vec<f32>)> = Vec::with_capacity(fragment_count);
    let mut skipped = 0usize;

    for (index, fragment) in fragments.into_iter().enumerate() {
        match producer.embed(&fragment).await {
            Ok(vector) => pairs.push((fragment, vector)),
            Err(e) => {
                warn!(
                    document_id,
                    fragment = index + 1,
                    total = fragment_count,
                    error = %e,
                    "embedding failed; skipping fragment"
                );
                skipped += 1;
            }
        }
    }

    let stored = pairs.len();
    store.insert_chunks_with_vectors(document_id, &pairs).await?;

    info!(document_id, fragments = fragment_count, stored, skipped, "document ingested");

    Ok(IngestReport {
        document_id: document_id.to_string(),
        fragments: fragment_count,
        stored,
        skipped,
    })
}

/// Hand an ingestion to a supervised task instead of firing and
/// forgetting it: the returned handle makes completion or failure
/// observable and awaitable by the caller.
pub fn spawn_ingest(
    store: Arc<VectorStore>,
    producer: Arc<EmbeddingProducer>,
    chunking: ChunkingConfig,
    document_id: String,
    bytes: Vec<u8>,
    mime_type: String,
) -> tokio::task::JoinHandle<Result<IngestReport>> {
    tokio::spawn(async move {
        let result = ingest_document(
            &store,
            &producer,
            &chunking,
            &document_id,
            &bytes,
            &mime_type,
        )
        .await;

        if let Err(ref e) = result {
            warn!(document_id, error = %e, "background ingestion failed");
        }

        result
    })
}
