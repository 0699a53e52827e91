use std::sync::Arc;
use std::time::Duration;

use cadabra_cache::{CacheService, KeyPart, cache_key, get_json, set_json};
use cadabra_core::{ALL_BUCKETS, Assignment, Experiment, ExperimentId, Identity, MAX_NAME_LEN, UserId};
use cadabra_store::ExperimentStore;
use rand::seq::IndexedRandom;

use crate::{ExperimentError, Registry};

/// Places users into buckets, at most once per experiment
///
/// The first assignment of a user sticks: later calls return the stored
/// bucket whatever candidate list they pass.
#[derive(Clone)]
pub struct AssignmentEngine {
    registry: Registry,
    store: Arc<dyn ExperimentStore>,
    cache: Arc<dyn CacheService>,
    ttl: Duration,
}

impl AssignmentEngine {
    pub fn new(
        registry: Registry,
        store: Arc<dyn ExperimentStore>,
        cache: Arc<dyn CacheService>,
        ttl: Duration,
    ) -> Self {
        Self {
            registry,
            store,
            cache,
            ttl,
        }
    }

    /// Return the bucket `identity` belongs to in experiment `experiment_name`
    ///
    /// Creates the experiment on first use. A user seen for the first time
    /// gets a bucket drawn uniformly from `buckets`.
    pub async fn assign(
        &self,
        identity: Identity,
        experiment_name: &str,
        buckets: &[String],
    ) -> Result<String, ExperimentError> {
        let user_id = identity.user_id().ok_or(ExperimentError::Unauthenticated)?;
        validate_buckets(buckets)?;

        let experiment = self.registry.resolve_or_create(experiment_name).await?;

        let key = assignment_key(experiment.id, user_id, buckets);
        if let Some(bucket) = get_json::<String>(self.cache.as_ref(), &key).await? {
            return Ok(bucket);
        }

        let drawn = buckets
            .choose(&mut rand::rng())
            .ok_or(ExperimentError::EmptyBuckets)?;

        let (assignment, created) = self
            .store
            .get_or_create_assignment(experiment.id, user_id, drawn)
            .await?;

        let bucket = match assignment.bucket {
            Some(bucket) => bucket,
            None => self.fill_missing(&experiment, user_id, drawn).await?,
        };

        if created {
            tracing::info!(
                experiment = %experiment.name,
                user_id = %user_id,
                bucket = %bucket,
                "user assigned to bucket"
            );
        }

        set_json(self.cache.as_ref(), &key, &bucket, self.ttl).await?;
        Ok(bucket)
    }

    /// Most recent assignment in an experiment, i.e. when it last ran
    pub async fn latest_assignment(&self, experiment_id: ExperimentId) -> Result<Option<Assignment>, ExperimentError> {
        Ok(self.store.latest_assignment(experiment_id).await?)
    }

    async fn fill_missing(
        &self,
        experiment: &Experiment,
        user_id: UserId,
        drawn: &str,
    ) -> Result<String, ExperimentError> {
        let filled = self
            .store
            .fill_missing_bucket(experiment.id, user_id, drawn)
            .await?
            .and_then(|a| a.bucket);

        filled.ok_or_else(|| {
            tracing::error!(
                experiment = %experiment.name,
                user_id = %user_id,
                "assignment has no bucket after assignment"
            );
            ExperimentError::MissingBucket {
                experiment: experiment.name.clone(),
                user_id,
            }
        })
    }
}

impl std::fmt::Debug for AssignmentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssignmentEngine")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

fn validate_buckets(buckets: &[String]) -> Result<(), ExperimentError> {
    if buckets.is_empty() {
        return Err(ExperimentError::EmptyBuckets);
    }
    for bucket in buckets {
        if bucket == ALL_BUCKETS {
            return Err(ExperimentError::ReservedBucket);
        }
        if bucket.trim().is_empty() {
            return Err(ExperimentError::InvalidBucket("label must not be empty".to_owned()));
        }
        if bucket.chars().count() > MAX_NAME_LEN {
            return Err(ExperimentError::InvalidBucket(format!(
                "label must be at most {MAX_NAME_LEN} characters"
            )));
        }
    }
    Ok(())
}

pub(crate) fn assignment_key(experiment_id: ExperimentId, user_id: UserId, buckets: &[String]) -> String {
    cache_key(
        "experiment",
        &[
            ("expt", KeyPart::Entity {
                kind: "Experiment",
                id: experiment_id.0,
            }),
            ("user", KeyPart::Entity {
                kind: "User",
                id: user_id.0,
            }),
            ("buckets", KeyPart::List(buckets)),
        ],
    )
}
