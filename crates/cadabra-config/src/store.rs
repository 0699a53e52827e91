use serde::Deserialize;

/// Durable store backend
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// In-process tables, lost on restart
    Memory,
    /// SQLite database file
    Sqlite(SqliteConfig),
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Sqlite(SqliteConfig::default())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteConfig {
    /// sqlx connection URL, e.g. `sqlite://data/cadabra.db`
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_url() -> String {
    "sqlite://data/cadabra.db".to_owned()
}

#[allow(clippy::missing_const_for_fn)]
fn default_max_connections() -> u32 {
    5
}
