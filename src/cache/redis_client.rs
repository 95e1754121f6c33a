use anyhow::Result;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, RedisResult};
use tracing::{debug, error, info};

use super::idempotency::IdempotencyStore;
use super::CacheConfig;
use crate::utils::errors::{AppError, AppResult};

/// Redis client over a multiplexed connection manager
#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
    config: CacheConfig,
}

impl RedisClient {
    pub async fn new(config: CacheConfig) -> Result<Self> {
        info!("🔗 Connecting to Redis");

        let client = redis::Client::open(config.redis_url.clone())?;
        let manager = ConnectionManager::new(client).await?;

        let mut conn = manager.clone();
        let _: () = redis::cmd("PING").query_async(&mut conn).await?;

        info!("✅ Redis connected");
        Ok(Self { manager, config })
    }

    /// Namespaced cache key
    pub fn make_key(&self, prefix: &str, identifier: &str) -> String {
        format!("rental_bookings:{}:{}", prefix, identifier)
    }

    pub fn default_ttl(&self) -> u64 {
        self.config.default_ttl
    }
}

#[async_trait]
impl IdempotencyStore for RedisClient {
    async fn load(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.manager.clone();
        let key = self.make_key("idempotency", key);

        let value: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| AppError::Cache(format!("Redis GET {}: {}", key, e)))?;

        match &value {
            Some(_) => debug!("📥 Cache HIT for key: {}", key),
            None => debug!("❌ Cache MISS for key: {}", key),
        }
        Ok(value)
    }

    async fn save(&self, key: &str, value: &str, ttl: u64) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let key = self.make_key("idempotency", key);

        let result: RedisResult<()> = conn.set_ex(&key, value, ttl).await;
        match result {
            Ok(()) => {
                debug!("💾 Cache SET for key: {} (TTL: {}s)", key, ttl);
                Ok(())
            }
            Err(e) => {
                error!("❌ Error writing cache key {}: {}", key, e);
                Err(AppError::Cache(format!("Redis SET {}: {}", key, e)))
            }
        }
    }

    async fn reserve(&self, key: &str, value: &str, ttl: u64) -> AppResult<bool> {
        let mut conn = self.manager.clone();
        let key = self.make_key("idempotency", key);

        // SET NX replies OK when stored and nil when the key exists
        let reply: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl)
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::Cache(format!("Redis SET NX {}: {}", key, e)))?;

        let reserved = reply.is_some();
        debug!("🔒 Cache SET NX for key: {} (reserved: {})", key, reserved);
        Ok(reserved)
    }

    async fn release(&self, key: &str) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let key = self.make_key("idempotency", key);

        let _: i64 = conn
            .del(&key)
            .await
            .map_err(|e| AppError::Cache(format!("Redis DEL {}: {}", key, e)))?;
        debug!("🗑️ Cache DEL for key: {}", key);
        Ok(())
    }
}
