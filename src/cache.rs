//! Time-bounded in-memory memo for embedding vectors.
//!
//! Maps a content fingerprint (derived by the embedding producer) to a
//! previously computed vector. Entries expire after a configured TTL and
//! are removed lazily on access; [`EmbeddingCache::sweep`] clears all
//! expired entries at once. The cache is a pure accelerator: it lives for
//! the process lifetime only and is never a source of truth, so losing it
//! on restart is fine.
//!
//! No eviction beyond TTL — the key space is bounded by distinct fragments
//! seen, which stays small relative to memory for the target workload.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct CacheEntry {
    vector: Vec<f32>,
    inserted_at: Instant,
}

pub struct EmbeddingCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl EmbeddingCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a vector. Absence is a miss, never an error; an expired
    /// entry is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.vector.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: String, vector: Vec<f32>) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key,
            CacheEntry {
                vector,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every expired entry. Callers may run this opportunistically;
    /// correctness does not depend on it because `get` checks expiry.
    pub fn sweep(&self) {
        let mut entries = self.entries.lock().unwrap();
        entries.retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
