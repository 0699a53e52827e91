//! HTTP surface for Cadabra
//!
//! Staff endpoints serve the dashboard reports; service endpoints let the
//! host application request assignments and mirror its users.

mod assignments;
mod auth;
mod error;
mod experiments;
mod health;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post, put};
use cadabra_cache::{CacheService, MemoryCache, NoopCache, RedisCache};
use cadabra_config::{CacheBackend, Config, Role, StoreConfig};
use cadabra_experiments::{CacheTtls, Experiments, MetricSource};
use cadabra_store::{ExperimentStore, MemoryStore, SqliteStore};
use tower_http::trace::TraceLayer;

use crate::state::{AppState, Reporting};

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
}

impl Server {
    /// Build the server from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the store or cache cannot be opened or the
    /// reporting time zone is unknown
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::with_metric_source(config, None).await
    }

    /// Build the server with host-defined report metrics
    ///
    /// # Errors
    ///
    /// Same as [`Server::new`]
    pub async fn with_metric_source(config: Config, metrics: Option<Arc<dyn MetricSource>>) -> anyhow::Result<Self> {
        let listen_address = config
            .server
            .listen_address
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8000)));

        let store = build_store(&config.store).await?;
        let cache = build_cache(&config.cache.backend)?;

        let ttls = CacheTtls {
            experiment: Duration::from_secs(config.cache.experiment_ttl_seconds),
            assignment: Duration::from_secs(config.cache.assignment_ttl_seconds),
        };
        let mut engine = Experiments::new(Arc::clone(&store), cache, ttls);
        if let Some(source) = metrics {
            engine = engine.with_metric_source(source);
        }

        let time_zone = jiff::tz::TimeZone::get(&config.reporting.time_zone)
            .map_err(|e| anyhow::anyhow!("unknown reporting time zone '{}': {e}", config.reporting.time_zone))?;

        let state = AppState {
            experiments: engine,
            store,
            reporting: Arc::new(Reporting {
                default_since: config.reporting.default_since,
                time_zone,
            }),
        };

        let staff = Router::new()
            .route("/experiments", get(experiments::list))
            .route("/experiments/{id}", get(experiments::detail))
            .route("/experiments/{id}/status", put(experiments::set_status))
            .route_layer(axum::middleware::from_fn(|req, next| {
                auth::require_role(Role::Staff, req, next)
            }));

        let service = Router::new()
            .route("/v1/assignments", post(assignments::assign))
            .route("/v1/users/{id}", put(assignments::save_user))
            .route_layer(axum::middleware::from_fn(|req, next| {
                auth::require_role(Role::Service, req, next)
            }));

        let mut app = staff.merge(service).with_state(state);

        if config.server.health.enabled {
            app = app.route(&config.server.health.path, get(health::health_handler));
        }

        // Tracing
        app = app.layer(TraceLayer::new_for_http());

        // Bearer token authentication
        if config.auth.enabled {
            let tokens = auth::TokenTable::from_config(&config.auth, &config.server.health);
            app = app.layer(axum::middleware::from_fn(move |req, next| {
                let tokens = tokens.clone();
                async move { auth::auth_middleware(tokens, req, next).await }
            }));
        } else {
            tracing::warn!("authentication disabled, every caller has staff access");
            app = app.layer(axum::middleware::from_fn(auth::open_access_middleware));
        }

        Ok(Self {
            router: app,
            listen_address,
        })
    }

    /// Get the configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        Ok(())
    }
}

async fn build_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn ExperimentStore>> {
    let store: Arc<dyn ExperimentStore> = match config {
        StoreConfig::Memory => {
            tracing::warn!("using in-memory store, data is lost on restart");
            Arc::new(MemoryStore::new())
        }
        StoreConfig::Sqlite(sqlite) => {
            let store = SqliteStore::connect(&sqlite.url, sqlite.max_connections)
                .await
                .map_err(|e| anyhow::anyhow!("failed to open store {}: {e}", sqlite.url))?;
            Arc::new(store)
        }
    };

    Ok(store)
}

fn build_cache(backend: &CacheBackend) -> anyhow::Result<Arc<dyn CacheService>> {
    let cache: Arc<dyn CacheService> = match backend {
        CacheBackend::Memory { max_capacity } => Arc::new(MemoryCache::new(*max_capacity)),
        CacheBackend::Redis(redis) => {
            let cache = RedisCache::new(redis.url.as_str(), Some(redis.key_prefix.clone()))
                .map_err(|e| anyhow::anyhow!("failed to configure cache: {e}"))?;
            tracing::info!(key_prefix = %redis.key_prefix, "valkey cache configured");
            Arc::new(cache)
        }
        CacheBackend::None => {
            tracing::info!("caching disabled");
            Arc::new(NoopCache)
        }
    };

    Ok(cache)
}
