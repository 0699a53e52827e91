//! Read-through cache for experiments and assignments
//!
//! The cache is an optimisation only: every value can be rebuilt from the
//! durable store, so callers treat a miss and an expired entry the same way.
//! Values are stored as JSON strings so that the in-memory and Valkey
//! backends are interchangeable.

#![allow(clippy::missing_errors_doc)]

mod key;
mod memory;
mod valkey;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use key::{KeyPart, MAX_KEY_LEN, cache_key};
pub use memory::MemoryCache;
pub use valkey::RedisCache;

/// Cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// Valkey connection or command error
    #[error("cache backend: {0}")]
    Backend(String),
    /// Serialization error
    #[error("serialization: {0}")]
    Serialization(String),
}

/// Key-value cache with per-entry expiry
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Look up a value, `None` on miss or expiry
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value for at most `ttl`
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}

/// Cache that never holds anything
///
/// Every lookup misses, so all reads go to the store.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

#[async_trait]
impl CacheService for NoopCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Look up and deserialize a cached value
pub async fn get_json<T: DeserializeOwned>(cache: &dyn CacheService, key: &str) -> Result<Option<T>, CacheError> {
    let Some(data) = cache.get(key).await? else {
        tracing::debug!(cache_key = key, "cache miss");
        return Ok(None);
    };

    let value = serde_json::from_str(&data).map_err(|e| CacheError::Serialization(format!("deserialize: {e}")))?;
    tracing::debug!(cache_key = key, "cache hit");
    Ok(Some(value))
}

/// Serialize and store a value
pub async fn set_json<T: Serialize + Sync>(
    cache: &dyn CacheService,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<(), CacheError> {
    let data = serde_json::to_string(value).map_err(|e| CacheError::Serialization(format!("serialize: {e}")))?;
    cache.set(key, data, ttl).await?;
    tracing::debug!(cache_key = key, ttl_secs = ttl.as_secs(), "cached value");
    Ok(())
}
