//! Retrieval engine: query string in, ranked chunks out.

use tracing::debug;

use crate::embedding::EmbeddingProducer;
use crate::error::Result;
use crate::models::SearchResult;
use crate::store::VectorStore;

/// Retrieve the `k` chunks most similar to `query`, joined with their
/// source document metadata and ordered by ascending distance (ties by
/// chunk id).
///
/// An empty or whitespace-only query returns an empty sequence without
/// calling the embedding service. Embedding and storage failures
/// propagate; there is no fallback ranking.
pub async fn retrieve(
    store: &VectorStore,
    producer: &EmbeddingProducer,
    query: &str,
    k: usize,
) -> Result<Vec<SearchResult>> {
    if query.trim().is_empty() {
        debug!("search query is empty");
        return Ok(Vec::new());
    }

    let query_vector = producer.embed(query).await?;
    let results = store.search(&query_vector, k).await?;

    debug!(
        count = results.len(),
        query = %query.chars().take(50).collect::<String>(),
        "similar chunks found"
    );

    Ok(results)
}
