use std::time::{Duration, Instant};

use async_trait::async_trait;
use mini_moka::sync::Cache;

use crate::{CacheError, CacheService};

/// Upper bound on how long any entry may live, whatever TTL it was set with
const MAX_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process TTL cache
///
/// Single instance only; each process keeps its own entries.
#[derive(Clone)]
pub struct MemoryCache {
    entries: Cache<String, Entry>,
}

impl MemoryCache {
    /// Create a cache holding at most `max_capacity` entries
    pub fn new(max_capacity: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(MAX_TTL)
                .build(),
        }
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.invalidate_all();
    }
}

#[async_trait]
impl CacheService for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let key = key.to_owned();
        let Some(entry) = self.entries.get(&key) else {
            return Ok(None);
        };

        if entry.expires_at <= Instant::now() {
            self.entries.invalidate(&key);
            return Ok(None);
        }

        Ok(Some(entry.value))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl.min(MAX_TTL),
        };
        self.entries.insert(key.to_owned(), entry);
        Ok(())
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_returns_none() {
        let cache = MemoryCache::new(100);
        assert!(cache.get("EXPERIMENT__name::E1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn hit_returns_value() {
        let cache = MemoryCache::new(100);
        cache
            .set("EXPERIMENT__name::E1", "{}".to_owned(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.get("EXPERIMENT__name::E1").await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn entries_expire_after_their_ttl() {
        let cache = MemoryCache::new(100);
        cache.set("short", "a".to_owned(), Duration::from_millis(20)).await.unwrap();
        cache.set("long", "b".to_owned(), Duration::from_secs(60)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(cache.get("short").await.unwrap().is_none());
        assert_eq!(cache.get("long").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let cache = MemoryCache::new(100);
        cache.set("a", "1".to_owned(), Duration::from_secs(60)).await.unwrap();
        cache.set("b", "2".to_owned(), Duration::from_secs(60)).await.unwrap();

        cache.clear();

        assert!(cache.get("a").await.unwrap().is_none());
        assert!(cache.get("b").await.unwrap().is_none());
    }
}
