use std::time::Duration;

use async_trait::async_trait;

use crate::{CacheError, CacheService};

/// Cache backed by Valkey (or any Redis-compatible server)
///
/// Shared between instances, so assignments cached by one process are
/// visible to the others until they expire.
#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
    key_prefix: String,
}

impl RedisCache {
    /// Create a new Valkey-backed cache
    ///
    /// # Errors
    ///
    /// Returns an error if the Valkey URL is invalid
    pub fn new(url: &str, key_prefix: Option<String>) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::Backend(format!("invalid URL: {e}")))?;

        Ok(Self {
            client,
            key_prefix: key_prefix.unwrap_or_else(|| "cadabra".to_owned()),
        })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, CacheError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Backend(format!("connection failed: {e}")))
    }
}

#[async_trait]
impl CacheService for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        use redis::AsyncCommands;

        let mut conn = self.connection().await?;
        let key = format!("{}:{key}", self.key_prefix);

        conn.get(&key)
            .await
            .map_err(|e| CacheError::Backend(format!("GET failed: {e}")))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        use redis::AsyncCommands;

        let mut conn = self.connection().await?;
        let key = format!("{}:{key}", self.key_prefix);

        // SET EX rejects a zero expiry
        let ttl_secs = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(&key, &value, ttl_secs)
            .await
            .map_err(|e| CacheError::Backend(format!("SET failed: {e}")))?;

        Ok(())
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}
