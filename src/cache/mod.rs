//! Redis-backed idempotency cache

pub mod cache_config;
pub mod idempotency;
pub mod redis_client;

pub use cache_config::CacheConfig;
pub use idempotency::{IdempotencyGuard, IdempotencyStore, InMemoryIdempotencyStore};
pub use redis_client::RedisClient;
