#![allow(clippy::must_use_candidate)]

pub mod auth;
pub mod cache;
mod env;
pub mod health;
mod loader;
pub mod reporting;
pub mod server;
pub mod store;
pub mod telemetry;

use serde::Deserialize;

pub use auth::*;
pub use cache::*;
pub use health::*;
pub use reporting::*;
pub use server::*;
pub use store::*;
pub use telemetry::*;

/// Top-level Cadabra configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// HTTP listener configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Durable store backend
    #[serde(default)]
    pub store: StoreConfig,
    /// Cache backend and TTLs
    #[serde(default)]
    pub cache: CacheConfig,
    /// Bearer tokens
    #[serde(default)]
    pub auth: AuthConfig,
    /// Report defaults
    #[serde(default)]
    pub reporting: ReportingConfig,
    /// Logging
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
