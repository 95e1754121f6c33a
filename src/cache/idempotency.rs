//! Idempotency keys for booking and payment-order creation
//!
//! Clients send an `Idempotency-Key` header. The key is stored against
//! `{user}:{scope}:{key}` together with an md5 checksum of the request body.
//! The first request reserves it atomically with an in-flight marker, runs,
//! then replaces the marker with its response. A retry with the same body
//! replays that response, a retry while the first is still running or with
//! a different body is a conflict.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::utils::errors::{AppError, AppResult};

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

const MIN_KEY_LEN: usize = 16;
const MAX_KEY_LEN: usize = 128;

/// Lifetime of an in-flight marker left behind by a crashed request
const IN_FLIGHT_TTL_SECS: u64 = 120;

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn load(&self, key: &str) -> AppResult<Option<String>>;
    async fn save(&self, key: &str, value: &str, ttl: u64) -> AppResult<()>;
    /// Store `value` only if `key` is absent. Returns whether it was stored.
    async fn reserve(&self, key: &str, value: &str, ttl: u64) -> AppResult<bool>;
    async fn release(&self, key: &str) -> AppResult<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredResponse {
    checksum: String,
    /// `None` while the first request is still running
    #[serde(default)]
    body: Option<serde_json::Value>,
}

/// Reads the idempotency key from the request headers. Absent header is
/// fine; a malformed one is rejected.
pub fn key_from_headers(headers: &HeaderMap) -> AppResult<Option<String>> {
    let Some(raw) = headers.get(IDEMPOTENCY_HEADER) else {
        return Ok(None);
    };
    let key = raw
        .to_str()
        .map_err(|_| AppError::Validation("Idempotency-Key must be ASCII".to_string()))?
        .trim();

    if key.len() < MIN_KEY_LEN || key.len() > MAX_KEY_LEN {
        return Err(AppError::Validation(format!(
            "Idempotency-Key must be between {} and {} characters",
            MIN_KEY_LEN, MAX_KEY_LEN
        )));
    }
    Ok(Some(key.to_string()))
}

pub fn request_checksum<T: Serialize>(request: &T) -> AppResult<String> {
    let bytes = serde_json::to_vec(request)
        .map_err(|e| AppError::Internal(format!("Could not serialize request: {}", e)))?;
    Ok(format!("{:x}", md5::compute(bytes)))
}

fn encode(stored: &StoredResponse) -> AppResult<String> {
    serde_json::to_string(stored)
        .map_err(|e| AppError::Internal(format!("Could not serialize response: {}", e)))
}

/// One idempotent operation for one user
pub struct IdempotencyGuard {
    store: Arc<dyn IdempotencyStore>,
    key: String,
    checksum: String,
    ttl: u64,
}

impl IdempotencyGuard {
    pub fn new<T: Serialize>(
        store: Arc<dyn IdempotencyStore>,
        user_id: Uuid,
        scope: &str,
        key: &str,
        request: &T,
        ttl: u64,
    ) -> AppResult<Self> {
        Ok(Self {
            store,
            key: format!("{}:{}:{}", user_id, scope, key),
            checksum: request_checksum(request)?,
            ttl,
        })
    }

    /// Reserve the key for this request. `Ok(None)` means the caller owns the
    /// key and must `record` or `release` it; `Ok(Some(_))` is the response
    /// of an earlier identical request.
    pub async fn begin<R: DeserializeOwned>(&self) -> AppResult<Option<R>> {
        let marker = encode(&StoredResponse {
            checksum: self.checksum.clone(),
            body: None,
        })?;

        // A second attempt covers a marker that expired between the calls
        for _ in 0..2 {
            if self
                .store
                .reserve(&self.key, &marker, IN_FLIGHT_TTL_SECS.min(self.ttl))
                .await?
            {
                debug!("🔒 Reserved idempotency key {}", self.key);
                return Ok(None);
            }
            if let Some(raw) = self.store.load(&self.key).await? {
                return self.replay(&raw).map(Some);
            }
        }

        Err(AppError::Conflict(
            "A request with this Idempotency-Key is still in progress".to_string(),
        ))
    }

    fn replay<R: DeserializeOwned>(&self, raw: &str) -> AppResult<R> {
        let stored: StoredResponse = serde_json::from_str(raw)
            .map_err(|e| AppError::Cache(format!("Corrupt idempotency entry: {}", e)))?;

        if stored.checksum != self.checksum {
            return Err(AppError::Conflict(
                "Idempotency-Key was already used with a different request".to_string(),
            ));
        }
        let Some(body) = stored.body else {
            return Err(AppError::Conflict(
                "A request with this Idempotency-Key is still in progress".to_string(),
            ));
        };

        info!("🔁 Replaying idempotent response for {}", self.key);
        serde_json::from_value(body)
            .map_err(|e| AppError::Cache(format!("Corrupt idempotency entry: {}", e)))
    }

    /// Replace the in-flight marker with the response
    pub async fn record<R: Serialize>(&self, response: &R) -> AppResult<()> {
        let raw = encode(&StoredResponse {
            checksum: self.checksum.clone(),
            body: Some(
                serde_json::to_value(response)
                    .map_err(|e| AppError::Internal(format!("Could not serialize response: {}", e)))?,
            ),
        })?;

        self.store.save(&self.key, &raw, self.ttl).await?;
        debug!("💾 Recorded idempotent response for {}", self.key);
        Ok(())
    }

    /// Drop the reservation after a failed request so the client may retry
    pub async fn release(&self) -> AppResult<()> {
        self.store.release(&self.key).await?;
        debug!("🔓 Released idempotency key {}", self.key);
        Ok(())
    }
}

/// Process-local store, used when Redis is not configured and in tests.
/// Entries never expire.
#[derive(Default, Clone)]
pub struct InMemoryIdempotencyStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn load(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str, _ttl: u64) -> AppResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn reserve(&self, key: &str, value: &str, _ttl: u64) -> AppResult<bool> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(true)
    }

    async fn release(&self, key: &str) -> AppResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
