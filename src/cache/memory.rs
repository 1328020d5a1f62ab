//! In-process cache
//!
//! Used when no Redis URL is configured and by tests. Expired entries are
//! evicted lazily when read.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{Cache, CacheError};

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct State {
    entries: HashMap<String, Entry>,
    generations: HashMap<String, u64>,
}

impl State {
    fn generation(&self, key: &str) -> u64 {
        self.generations.get(key).copied().unwrap_or(0)
    }
}

/// Process-local cache with per-entry expiry
#[derive(Debug, Default)]
pub struct MemoryCache {
    state: RwLock<State>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included
    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        {
            let state = self.state.read().await;
            match state.entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.value.clone()))
                }
                Some(_) => {}
            }
        }

        let mut state = self.state.write().await;
        if state
            .entries
            .get(key)
            .is_some_and(|entry| entry.expires_at <= Instant::now())
        {
            state.entries.remove(key);
        }
        Ok(None)
    }

    async fn generation(&self, key: &str) -> Result<u64, CacheError> {
        Ok(self.state.read().await.generation(key))
    }

    async fn set_if_generation(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
        generation: u64,
    ) -> Result<bool, CacheError> {
        let mut state = self.state.write().await;
        if state.generation(key) != generation {
            return Ok(false);
        }

        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        state.entries.insert(key.to_string(), entry);
        Ok(true)
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        let mut state = self.state.write().await;
        for key in keys {
            *state.generations.entry(key.clone()).or_insert(0) += 1;
            state.entries.remove(key);
        }
        Ok(())
    }
}
