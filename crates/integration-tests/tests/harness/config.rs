//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;

use cadabra_config::{
    AuthConfig, CacheBackend, CacheConfig, Config, HealthConfig, ReportingConfig, Role, ServerConfig, SqliteConfig,
    StoreConfig, TelemetryConfig, TokenConfig,
};
use cadabra_core::SinceSelector;
use secrecy::SecretString;

pub const STAFF_TOKEN: &str = "staff-test-token";
pub const SERVICE_TOKEN: &str = "service-test-token";

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder: in-memory store and cache, one token per role
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    health: HealthConfig::default(),
                },
                store: StoreConfig::Memory,
                cache: CacheConfig::default(),
                auth: AuthConfig {
                    tokens: vec![
                        TokenConfig {
                            name: "dashboard".to_owned(),
                            token: SecretString::from(STAFF_TOKEN),
                            role: Role::Staff,
                        },
                        TokenConfig {
                            name: "web".to_owned(),
                            token: SecretString::from(SERVICE_TOKEN),
                            role: Role::Service,
                        },
                    ],
                    ..AuthConfig::default()
                },
                reporting: ReportingConfig::default(),
                telemetry: TelemetryConfig::default(),
            },
        }
    }

    /// Store data in a SQLite database at `url`
    pub fn with_sqlite(mut self, url: &str) -> Self {
        self.config.store = StoreConfig::Sqlite(SqliteConfig {
            url: url.to_owned(),
            max_connections: 2,
        });
        self
    }

    /// Turn caching off so every lookup reaches the store
    pub fn without_cache(mut self) -> Self {
        self.config.cache.backend = CacheBackend::None;
        self
    }

    /// Report window used when a request names none
    pub fn with_default_since(mut self, since: SinceSelector) -> Self {
        self.config.reporting.default_since = since;
        self
    }

    /// Accept requests without a token
    pub fn without_auth(mut self) -> Self {
        self.config.auth.enabled = false;
        self
    }

    /// Disable health endpoint
    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    pub fn with_health_path(mut self, path: &str) -> Self {
        self.config.server.health.path = path.to_owned();
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}
