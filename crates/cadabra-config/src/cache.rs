use serde::Deserialize;
use url::Url;

/// Cache configuration
///
/// The cache only speeds up lookups; the store stays authoritative.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    /// How long a resolved experiment stays cached, in seconds
    #[serde(default = "default_ttl_seconds")]
    pub experiment_ttl_seconds: u64,
    /// How long an assignment stays cached, in seconds
    #[serde(default = "default_ttl_seconds")]
    pub assignment_ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            experiment_ttl_seconds: default_ttl_seconds(),
            assignment_ttl_seconds: default_ttl_seconds(),
        }
    }
}

/// Cache backend
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheBackend {
    /// In-process cache (single instance only)
    Memory {
        #[serde(default = "default_max_capacity")]
        max_capacity: u64,
    },
    /// Valkey / Redis shared cache
    Redis(RedisCacheConfig),
    /// No caching at all
    None,
}

impl Default for CacheBackend {
    fn default() -> Self {
        Self::Memory {
            max_capacity: default_max_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisCacheConfig {
    /// Valkey connection URL
    pub url: Url,
    /// Key prefix in Valkey
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

#[allow(clippy::missing_const_for_fn)]
fn default_ttl_seconds() -> u64 {
    3600
}

#[allow(clippy::missing_const_for_fn)]
fn default_max_capacity() -> u64 {
    100_000
}

fn default_key_prefix() -> String {
    "cadabra".to_owned()
}
