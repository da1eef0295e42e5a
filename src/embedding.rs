//! Embedding generation with caching.
//!
//! [`EmbeddingProducer`] is the only component that talks to the upstream
//! embedding service. It normalizes input text, consults the TTL-bounded
//! [`EmbeddingCache`], and calls the backend only on a miss. The upstream
//! call itself sits behind the [`EmbeddingBackend`] trait so the pipeline
//! and retrieval engine can be exercised without a network.
//!
//! # Retry Strategy
//!
//! The OpenAI backend retries transient errors with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::cache::EmbeddingCache;
use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

const OPENAI_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// Cache keys are a bounded prefix of the normalized text. Collisions are
/// possible and accepted as a space/precision trade-off.
const CACHE_KEY_PREFIX: &str = "embedding_";
const CACHE_KEY_CHARS: usize = 100;

/// Raw upstream embedding call, one text in, one vector out.
///
/// Implementations must validate the response shape before trusting it:
/// a malformed or empty response is an [`Error::ExternalService`], never
/// silently coerced.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Backend for the OpenAI embeddings API (`POST /v1/embeddings`).
///
/// Requires `OPENAI_API_KEY` in the environment.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl OpenAiBackend {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::ExternalService("OPENAI_API_KEY not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::ExternalService(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAiBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(OPENAI_EMBEDDINGS_URL)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| Error::ExternalService(e.to_string()))?;
                        return parse_embedding_response(&json);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(Error::ExternalService(format!(
                            "embeddings API error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(Error::ExternalService(format!(
                        "embeddings API error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(Error::ExternalService(e.to_string()));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::ExternalService("embedding failed after retries".to_string())))
    }
}

/// Extract the first `data[].embedding` array, rejecting any response that
/// does not contain at least one non-empty, all-numeric vector.
fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            Error::ExternalService("invalid embeddings API response structure".to_string())
        })?;

    if embedding.is_empty() {
        return Err(Error::ExternalService(
            "embeddings API returned an empty vector".to_string(),
        ));
    }

    embedding
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                Error::ExternalService(format!(
                    "embeddings API returned a non-numeric vector element: {}",
                    v
                ))
            })
        })
        .collect()
}

/// Cache-checked embedding producer.
///
/// Owns the [`EmbeddingCache`]; no other component reads or writes it.
pub struct EmbeddingProducer {
    backend: Box<dyn EmbeddingBackend>,
    cache: EmbeddingCache,
}

impl EmbeddingProducer {
    pub fn new(backend: Box<dyn EmbeddingBackend>, cache_ttl: Duration) -> Self {
        Self {
            backend,
            cache: EmbeddingCache::new(cache_ttl),
        }
    }

    /// Build a producer backed by the OpenAI API, configured per `config`.
    pub fn openai(config: &EmbeddingConfig) -> Result<Self> {
        let backend = OpenAiBackend::new(config)?;
        Ok(Self::new(
            Box::new(backend),
            Duration::from_secs(config.cache_ttl_secs),
        ))
    }

    /// Embed one text fragment, consulting the cache first.
    ///
    /// Fails with [`Error::InvalidInput`] when the text is empty after
    /// trimming, and with [`Error::ExternalService`] when the upstream
    /// call fails or returns a malformed response.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("input text cannot be empty".to_string()));
        }

        // The upstream API mishandles embedded newlines.
        let normalized = text.replace('\n', " ");
        let key = cache_key(&normalized);

        if let Some(vector) = self.cache.get(&key) {
            debug!(prefix = %truncate_for_log(&normalized), "embedding cache hit");
            return Ok(vector);
        }

        let vector = self.backend.embed(&normalized).await?;
        self.cache.insert(key, vector.clone());
        Ok(vector)
    }

    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }
}

fn cache_key(normalized: &str) -> String {
    let prefix: String = normalized.chars().take(CACHE_KEY_CHARS).collect();
    format!("{}{}", CACHE_KEY_PREFIX, prefix)
}

fn truncate_for_log(text: &str) -> String {
    text.chars().take(30).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingBackend {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EmbeddingBackend for CountingBackend {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.1, 0.2, 0.3])
        }
    }

    fn counting_producer() -> (EmbeddingProducer, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = CountingBackend {
            calls: calls.clone(),
        };
        (
            EmbeddingProducer::new(Box::new(backend), Duration::from_secs(300)),
            calls,
        )
    }

    #[tokio::test]
    async fn empty_text_is_invalid_input() {
        let (producer, calls) = counting_producer();
        let err = producer.embed("   ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn repeated_text_hits_cache() {
        let (producer, calls) = counting_producer();
        let first = producer.embed("hello world").await.unwrap();
        let second = producer.embed("hello world").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn newline_normalization_shares_cache_entry() {
        let (producer, calls) = counting_producer();
        producer.embed("hello\nworld").await.unwrap();
        producer.embed("hello world").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_cache_entry_triggers_new_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = CountingBackend {
            calls: calls.clone(),
        };
        let producer = EmbeddingProducer::new(Box::new(backend), Duration::from_millis(10));
        producer.embed("hello").await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        producer.embed("hello").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cache_key_is_bounded_prefix() {
        let long = "x".repeat(500);
        let key = cache_key(&long);
        assert_eq!(key.chars().count(), CACHE_KEY_PREFIX.len() + CACHE_KEY_CHARS);
    }

    #[test]
    fn parse_valid_response() {
        let json = serde_json::json!({
            "data": [{ "embedding": [0.5, -0.25, 1.0] }]
        });
        let vec = parse_embedding_response(&json).unwrap();
        assert_eq!(vec, vec![0.5, -0.25, 1.0]);
    }

    #[test]
    fn parse_missing_data_is_external_error() {
        let json = serde_json::json!({ "object": "list" });
        let err = parse_embedding_response(&json).unwrap_err();
        assert!(matches!(err, Error::ExternalService(_)));
    }

    #[test]
    fn parse_empty_vector_is_external_error() {
        let json = serde_json::json!({ "data": [{ "embedding": [] }] });
        let err = parse_embedding_response(&json).unwrap_err();
        assert!(matches!(err, Error::ExternalService(_)));
    }

    #[test]
    fn parse_non_numeric_element_is_external_error() {
        let json = serde_json::json!({ "data": [{ "embedding": ["a", "b"] }] });
        let err = parse_embedding_response(&json).unwrap_err();
        assert!(matches!(err, Error::ExternalService(_)));

        // A single bad element poisons the whole vector.
        let json = serde_json::json!({ "data": [{ "embedding": [0.5, null, 1.0] }] });
        let err = parse_embedding_response(&json).unwrap_err();
        assert!(matches!(err, Error::ExternalService(_)));
    }
}
