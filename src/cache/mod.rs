//! Cache module
//!
//! Best-effort key/value cache in front of account summary reads.
//! Nothing stored here is authoritative; callers recover from every
//! cache failure locally.

pub mod memory;
pub mod redis_cache;

use std::time::Duration;

use async_trait::async_trait;

pub use self::memory::MemoryCache;
pub use self::redis_cache::RedisCache;

/// Default time-to-live of cached summaries (30 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Cache errors
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Key/value cache capability.
///
/// Every key carries an invalidation generation, advanced by `delete`.
/// A reader records the generation before reading the source of truth and
/// writes back with `set_if_generation`, so a value read before an
/// invalidation can never land after it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch a value; `None` on miss or expiry
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Current invalidation generation of `key`, 0 if never invalidated
    async fn generation(&self, key: &str) -> Result<u64, CacheError>;

    /// Store a value for `ttl` unless `key` was invalidated after
    /// `generation` was read. Returns whether the value was stored.
    async fn set_if_generation(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
        generation: u64,
    ) -> Result<bool, CacheError>;

    /// Remove keys and advance their generations; missing keys are ignored
    async fn delete(&self, keys: &[String]) -> Result<(), CacheError>;
}
