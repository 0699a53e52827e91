//! Split-test engine
//!
//! Three components share one durable store and one cache:
//!
//! - [`Registry`] resolves experiments by name, creating them on first use
//! - [`AssignmentEngine`] places a user in a bucket exactly once per experiment
//! - [`AggregationEngine`] summarises each bucket and flags per-metric winners
//!
//! ```ignore
//! let bucket = experiments
//!     .assignments()
//!     .assign(identity, "E1234 - new next button", &["control".into(), "test 1".into()])
//!     .await?;
//! if bucket == "test 1" {
//!     // do it the new way
//! }
//! ```

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod assignment;
mod error;
mod metrics;
mod registry;
mod report;

use std::sync::Arc;
use std::time::Duration;

use cadabra_cache::CacheService;
use cadabra_store::ExperimentStore;

pub use assignment::AssignmentEngine;
pub use error::ExperimentError;
pub use metrics::{BucketReport, Metric, MetricSource, N_USERS};
pub use registry::{ExperimentListing, Registry};
pub use report::{AggregationEngine, SIGNIFICANCE_RATIO, best_per_metric, effective_since};

/// How long resolved experiments and assignments stay cached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub experiment: Duration,
    pub assignment: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            experiment: Duration::from_secs(3600),
            assignment: Duration::from_secs(3600),
        }
    }
}

/// The registry, assignment and aggregation engines wired to one store and cache
#[derive(Clone)]
pub struct Experiments {
    registry: Registry,
    assignments: AssignmentEngine,
    reports: AggregationEngine,
}

impl Experiments {
    pub fn new(store: Arc<dyn ExperimentStore>, cache: Arc<dyn CacheService>, ttls: CacheTtls) -> Self {
        let registry = Registry::new(Arc::clone(&store), Arc::clone(&cache), ttls.experiment);
        let assignments = AssignmentEngine::new(registry.clone(), Arc::clone(&store), cache, ttls.assignment);
        let reports = AggregationEngine::new(store);

        Self {
            registry,
            assignments,
            reports,
        }
    }

    /// Add host-defined metrics to every bucket report
    #[must_use]
    pub fn with_metric_source(mut self, source: Arc<dyn MetricSource>) -> Self {
        self.reports = self.reports.with_metric_source(source);
        self
    }

    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    pub const fn assignments(&self) -> &AssignmentEngine {
        &self.assignments
    }

    pub const fn reports(&self) -> &AggregationEngine {
        &self.reports
    }
}

impl std::fmt::Debug for Experiments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Experiments").finish_non_exhaustive()
    }
}
