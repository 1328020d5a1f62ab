//! Redis-backed cache
//!
//! Generations live in a separate `gen:<key>` counter next to each value.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

use super::{Cache, CacheError};

/// KEYS[1] = generation counter, KEYS[2] = value key;
/// ARGV = expected generation, value, ttl seconds
const SET_IF_GENERATION: &str = r"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
if current ~= tonumber(ARGV[1]) then
    return 0
end
redis.call('SET', KEYS[2], ARGV[2], 'EX', ARGV[3])
return 1
";

fn generation_key(key: &str) -> String {
    format!("gen:{}", key)
}

/// Cache stored in Redis with per-key expiry (`SET ... EX`)
#[derive(Clone)]
pub struct RedisCache {
    redis: ConnectionManager,
    set_if_generation: Script,
}

impl RedisCache {
    pub fn new(redis: ConnectionManager) -> Self {
        RedisCache {
            redis,
            set_if_generation: Script::new(SET_IF_GENERATION),
        }
    }

    /// Connect to the Redis server at `url`
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;
        tracing::info!("Connected to Redis cache");
        Ok(Self::new(manager))
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let value: Option<String> = self.redis.clone().get(key).await?;
        Ok(value)
    }

    async fn generation(&self, key: &str) -> Result<u64, CacheError> {
        let generation: Option<u64> = self.redis.clone().get(generation_key(key)).await?;
        Ok(generation.unwrap_or(0))
    }

    async fn set_if_generation(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
        generation: u64,
    ) -> Result<bool, CacheError> {
        // EX 0 is rejected by Redis
        let seconds = ttl.as_secs().max(1);
        let mut conn = self.redis.clone();
        let stored: i32 = self
            .set_if_generation
            .key(generation_key(key))
            .key(key)
            .arg(generation)
            .arg(value)
            .arg(seconds)
            .invoke_async(&mut conn)
            .await?;
        Ok(stored == 1)
    }

    async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }

        // Generation first, then the value, in one MULTI block
        let mut pipe = redis::pipe();
        pipe.atomic();
        for key in keys {
            pipe.incr(generation_key(key), 1).ignore();
            pipe.del(key).ignore();
        }

        let mut conn = self.redis.clone();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }
}
