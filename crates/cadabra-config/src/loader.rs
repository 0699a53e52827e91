use std::collections::HashSet;
use std::path::Path;

use secrecy::ExposeSecret;

use crate::{CacheBackend, Config, StoreConfig};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing or validation fails
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error describing the first inconsistency found
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_store_config()?;
        self.validate_cache_config()?;
        self.validate_auth_config()?;
        self.validate_reporting_config()?;
        Ok(())
    }

    fn validate_store_config(&self) -> anyhow::Result<()> {
        if let StoreConfig::Sqlite(ref sqlite) = self.store {
            if sqlite.url.trim().is_empty() {
                anyhow::bail!("store.url must not be empty");
            }
            if sqlite.max_connections == 0 {
                anyhow::bail!("store.max_connections must be greater than 0");
            }
        }

        Ok(())
    }

    fn validate_cache_config(&self) -> anyhow::Result<()> {
        if self.cache.experiment_ttl_seconds == 0 {
            anyhow::bail!("cache.experiment_ttl_seconds must be greater than 0");
        }

        if self.cache.assignment_ttl_seconds == 0 {
            anyhow::bail!("cache.assignment_ttl_seconds must be greater than 0");
        }

        if let CacheBackend::Memory { max_capacity } = self.cache.backend
            && max_capacity == 0
        {
            anyhow::bail!("cache.backend.max_capacity must be greater than 0");
        }

        Ok(())
    }

    /// Validate tokens when auth is enabled
    fn validate_auth_config(&self) -> anyhow::Result<()> {
        if !self.auth.enabled {
            return Ok(());
        }

        if self.auth.tokens.is_empty() {
            anyhow::bail!("auth.tokens must not be empty when auth is enabled");
        }

        let mut seen = HashSet::new();
        for token in &self.auth.tokens {
            if token.token.expose_secret().is_empty() {
                anyhow::bail!("auth token '{}' must not be empty", token.name);
            }
            if !seen.insert(token.token.expose_secret()) {
                anyhow::bail!("auth token '{}' duplicates another token", token.name);
            }
        }

        Ok(())
    }

    fn validate_reporting_config(&self) -> anyhow::Result<()> {
        jiff::tz::TimeZone::get(&self.reporting.time_zone)
            .map_err(|e| anyhow::anyhow!("reporting.time_zone '{}' is not valid: {e}", self.reporting.time_zone))?;

        Ok(())
    }
}
