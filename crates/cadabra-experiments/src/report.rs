use std::sync::Arc;

use cadabra_core::{ALL_BUCKETS, Experiment, UserId};
use cadabra_store::ExperimentStore;
use indexmap::IndexMap;
use jiff::Timestamp;

use crate::{BucketReport, ExperimentError, Metric, MetricSource, N_USERS};

/// Smallest max/min ratio that counts as a real difference between buckets
///
/// A fixed heuristic, not a statistical test.
pub const SIGNIFICANCE_RATIO: f64 = 1.03;

/// Summarises the buckets of an experiment
#[derive(Clone)]
pub struct AggregationEngine {
    store: Arc<dyn ExperimentStore>,
    metrics: Option<Arc<dyn MetricSource>>,
}

impl AggregationEngine {
    pub fn new(store: Arc<dyn ExperimentStore>) -> Self {
        Self { store, metrics: None }
    }

    #[must_use]
    pub fn with_metric_source(mut self, source: Arc<dyn MetricSource>) -> Self {
        self.metrics = Some(source);
        self
    }

    /// Sorted distinct bucket labels recorded for `experiment`
    pub async fn bucket_names(&self, experiment: &Experiment) -> Result<Vec<String>, ExperimentError> {
        let mut names = self.store.bucket_labels(experiment.id).await?;

        if names.iter().any(|n| n == ALL_BUCKETS) {
            tracing::error!(
                experiment = %experiment.name,
                experiment_id = %experiment.id,
                "reserved bucket label recorded"
            );
            return Err(ExperimentError::ReservedBucketRecorded {
                experiment: experiment.name.clone(),
            });
        }

        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Report on the users of one bucket who joined at or after `since`
    ///
    /// `bucket` may be [`ALL_BUCKETS`] for every participant of the
    /// experiment. The bound never reaches before the experiment's creation.
    pub async fn report(
        &self,
        experiment: &Experiment,
        bucket: &str,
        since: Option<Timestamp>,
    ) -> Result<BucketReport, ExperimentError> {
        let floor = effective_since(experiment, since);
        let filter = (bucket != ALL_BUCKETS).then_some(bucket);

        let users = self.store.participants(experiment.id, filter, Some(floor)).await?;
        let user_count = users.len();

        let mut metrics = IndexMap::new();
        metrics.insert(N_USERS.to_owned(), Metric::new(count_as_f64(user_count)));

        if let Some(source) = &self.metrics {
            let ids: Vec<UserId> = users.iter().map(|u| u.id).collect();
            let extra = source.compute(&ids).await.map_err(ExperimentError::Metric)?;
            for (name, value) in extra {
                metrics.entry(name).or_insert(Metric::new(value));
            }
        }

        tracing::debug!(experiment = %experiment.name, bucket, user_count, "bucket report computed");

        Ok(BucketReport {
            name: bucket.to_owned(),
            user_count,
            users: users.into_iter().map(|u| u.username).collect(),
            metrics,
        })
    }

    /// Report on every bucket, plus [`ALL_BUCKETS`] when `include_all` is set
    ///
    /// Winners are flagged. Also returns the join-date bound actually applied.
    pub async fn compute_buckets(
        &self,
        experiment: &Experiment,
        since: Option<Timestamp>,
        include_all: bool,
    ) -> Result<(Vec<BucketReport>, Timestamp), ExperimentError> {
        let mut names = self.bucket_names(experiment).await?;
        if include_all {
            names.push(ALL_BUCKETS.to_owned());
        }

        let mut reports = Vec::with_capacity(names.len());
        for name in &names {
            reports.push(self.report(experiment, name, since).await?);
        }

        best_per_metric(&mut reports);
        Ok((reports, effective_since(experiment, since)))
    }
}

impl std::fmt::Debug for AggregationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregationEngine")
            .field("has_metric_source", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

/// The later of `since` and the experiment's creation time
pub fn effective_since(experiment: &Experiment, since: Option<Timestamp>) -> Timestamp {
    since.map_or(experiment.created_at, |s| s.max(experiment.created_at))
}

/// Flag, per metric, the first report holding a significantly larger value
///
/// Metrics are taken from the first report. No winner is flagged when the
/// smallest value is zero or the largest is less than [`SIGNIFICANCE_RATIO`]
/// times the smallest.
#[allow(clippy::float_cmp)]
pub fn best_per_metric(reports: &mut [BucketReport]) {
    let Some(first) = reports.first() else {
        return;
    };
    let names: Vec<String> = first.metrics.keys().cloned().collect();

    for name in names {
        let values: Vec<Option<f64>> = reports.iter().map(|r| r.metric(&name).map(|m| m.value)).collect();

        let max = values.iter().flatten().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().flatten().copied().fold(f64::INFINITY, f64::min);

        for report in reports.iter_mut() {
            if let Some(metric) = report.metrics.get_mut(&name) {
                metric.max = false;
            }
        }

        if min == 0.0 || max / min < SIGNIFICANCE_RATIO {
            continue;
        }

        if let Some(winner) = values.iter().position(|v| *v == Some(max))
            && let Some(metric) = reports[winner].metrics.get_mut(&name)
        {
            metric.max = true;
        }
    }
}

fn count_as_f64(count: usize) -> f64 {
    f64::from(u32::try_from(count).unwrap_or(u32::MAX))
}
