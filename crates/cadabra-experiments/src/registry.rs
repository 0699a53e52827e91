use std::sync::Arc;
use std::time::Duration;

use cadabra_cache::{CacheService, KeyPart, cache_key, get_json, set_json};
use cadabra_core::{Experiment, ExperimentId, ExperimentStatus, MAX_NAME_LEN};
use cadabra_store::ExperimentStore;
use serde::Serialize;

use crate::ExperimentError;

/// Resolves experiments by name, creating unknown ones on first use
///
/// There is no registration step: the first assignment request for a name
/// creates the experiment.
#[derive(Clone)]
pub struct Registry {
    store: Arc<dyn ExperimentStore>,
    cache: Arc<dyn CacheService>,
    ttl: Duration,
}

/// Experiments split by soft-delete status, newest first
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentListing {
    pub active: Vec<Experiment>,
    pub inactive: Vec<Experiment>,
}

impl ExperimentListing {
    pub fn total(&self) -> usize {
        self.active.len() + self.inactive.len()
    }
}

impl Registry {
    pub fn new(store: Arc<dyn ExperimentStore>, cache: Arc<dyn CacheService>, ttl: Duration) -> Self {
        Self { store, cache, ttl }
    }

    /// Look up the experiment called `name`, creating it if it does not exist
    ///
    /// Served from the cache when possible. Concurrent calls for a new name
    /// converge on one stored experiment.
    pub async fn resolve_or_create(&self, name: &str) -> Result<Experiment, ExperimentError> {
        validate_name(name)?;

        let key = cache_key("experiment", &[("name", KeyPart::Str(name))]);
        // Keys collapse whitespace, so distinct names can share one
        if let Some(experiment) = get_json::<Experiment>(self.cache.as_ref(), &key).await?
            && experiment.name == name
        {
            return Ok(experiment);
        }

        let (experiment, created) = self.store.get_or_create_experiment(name).await?;
        if created {
            tracing::info!(experiment = %experiment.name, experiment_id = %experiment.id, "experiment created");
        }

        set_json(self.cache.as_ref(), &key, &experiment, self.ttl).await?;
        Ok(experiment)
    }

    /// Fetch an experiment by id, active or not
    pub async fn get(&self, id: ExperimentId) -> Result<Experiment, ExperimentError> {
        self.store
            .experiment(id)
            .await?
            .ok_or(ExperimentError::NotFound { id })
    }

    pub async fn list(&self) -> Result<ExperimentListing, ExperimentError> {
        let (active, inactive) = self
            .store
            .experiments()
            .await?
            .into_iter()
            .partition(Experiment::is_active);

        Ok(ExperimentListing { active, inactive })
    }

    /// Soft-delete or reactivate an experiment
    pub async fn set_status(&self, id: ExperimentId, status: ExperimentStatus) -> Result<Experiment, ExperimentError> {
        let experiment = self
            .store
            .set_experiment_status(id, status)
            .await?
            .ok_or(ExperimentError::NotFound { id })?;

        tracing::info!(experiment = %experiment.name, %status, "experiment status changed");
        Ok(experiment)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

fn validate_name(name: &str) -> Result<(), ExperimentError> {
    if name.trim().is_empty() {
        return Err(ExperimentError::InvalidName("name must not be empty".to_owned()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ExperimentError::InvalidName(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use cadabra_cache::MemoryCache;
    use cadabra_store::MemoryStore;

    use super::*;
    use crate::testing::harness;

    #[tokio::test]
    async fn creates_on_first_use_and_reuses_after() {
        let h = harness();
        let registry = h.experiments.registry();

        let first = registry.resolve_or_create("E1").await.unwrap();
        let second = registry.resolve_or_create("E1").await.unwrap();
        assert_eq!(first, second);

        let other = registry.resolve_or_create("E2").await.unwrap();
        assert_ne!(first.id, other.id);
        assert_eq!(h.store.experiments().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn works_without_cache() {
        let store: Arc<dyn ExperimentStore> = Arc::new(MemoryStore::new());
        let registry = Registry::new(Arc::clone(&store), Arc::new(cadabra_cache::NoopCache), Duration::from_secs(60));

        let first = registry.resolve_or_create("E1").await.unwrap();
        let second = registry.resolve_or_create("E1").await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(store.experiments().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resolved_experiments_are_cached() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new(100));
        let registry = Registry::new(store.clone(), cache.clone(), Duration::from_secs(60));

        let experiment = registry.resolve_or_create("E1").await.unwrap();

        let key = cache_key("experiment", &[("name", KeyPart::Str("E1"))]);
        let cached: Option<Experiment> = get_json(cache.as_ref(), &key).await.unwrap();
        assert_eq!(cached, Some(experiment));
    }

    #[tokio::test]
    async fn whitespace_variants_resolve_to_their_own_experiment() {
        let h = harness();
        let registry = h.experiments.registry();

        let a = registry.resolve_or_create("E1 next button").await.unwrap();
        let b = registry.resolve_or_create("E1  next button").await.unwrap();
        let c = registry.resolve_or_create("E1 next button ").await.unwrap();

        assert_eq!(a.name, "E1 next button");
        assert_eq!(b.name, "E1  next button");
        assert_eq!(c.name, "E1 next button ");
        assert_ne!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_ne!(b.id, c.id);
        assert_eq!(h.store.experiments().await.unwrap().len(), 3);

        // Same ids come back on the next round, cached or not
        assert_eq!(registry.resolve_or_create("E1  next button").await.unwrap().id, b.id);
        assert_eq!(registry.resolve_or_create("E1 next button").await.unwrap().id, a.id);
    }

    #[tokio::test]
    async fn rejects_empty_and_oversized_names() {
        let h = harness();
        let registry = h.experiments.registry();

        let err = registry.resolve_or_create("   ").await.unwrap_err();
        assert!(matches!(err, ExperimentError::InvalidName(_)));

        let long = "x".repeat(MAX_NAME_LEN + 1);
        let err = registry.resolve_or_create(&long).await.unwrap_err();
        assert!(matches!(err, ExperimentError::InvalidName(_)));

        assert!(h.store.experiments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lists_by_status_and_soft_deletes() {
        let h = harness();
        let registry = h.experiments.registry();

        let e1 = registry.resolve_or_create("E1").await.unwrap();
        registry.resolve_or_create("E2").await.unwrap();

        let updated = registry.set_status(e1.id, ExperimentStatus::Inactive).await.unwrap();
        assert!(!updated.is_active());

        let listing = registry.list().await.unwrap();
        assert_eq!(listing.active.len(), 1);
        assert_eq!(listing.inactive.len(), 1);
        assert_eq!(listing.total(), 2);
        assert_eq!(listing.inactive[0].id, e1.id);

        // Inactive experiments stay viewable
        assert_eq!(registry.get(e1.id).await.unwrap().status, ExperimentStatus::Inactive);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let h = harness();
        let err = h.experiments.registry().get(ExperimentId(42)).await.unwrap_err();
        assert!(matches!(err, ExperimentError::NotFound { id } if id == ExperimentId(42)));

        let err = h
            .experiments
            .registry()
            .set_status(ExperimentId(42), ExperimentStatus::Inactive)
            .await
            .unwrap_err();
        assert!(matches!(err, ExperimentError::NotFound { .. }));
    }
}
