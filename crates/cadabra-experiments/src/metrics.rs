use async_trait::async_trait;
use cadabra_core::UserId;
use indexmap::IndexMap;
use serde::Serialize;

/// Built-in metric present in every report: number of users in the bucket
pub const N_USERS: &str = "n_users";

/// One numeric metric of a bucket
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Metric {
    pub value: f64,
    /// Set on the single bucket that wins this metric
    pub max: bool,
}

impl Metric {
    pub const fn new(value: f64) -> Self {
        Self { value, max: false }
    }
}

/// Summary of the users in one bucket (or in all of them)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketReport {
    pub name: String,
    pub user_count: usize,
    /// Usernames ordered by user id
    pub users: Vec<String>,
    pub metrics: IndexMap<String, Metric>,
}

impl BucketReport {
    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.get(name)
    }

    /// Usernames as one human-readable line
    pub fn listing(&self) -> String {
        self.users.join("; ")
    }
}

/// Host-defined metrics computed over the users of a bucket
///
/// Every report gets [`N_USERS`]; a source adds domain numbers such as
/// purchases per user. The returned order is kept in reports.
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn compute(&self, user_ids: &[UserId]) -> anyhow::Result<IndexMap<String, f64>>;
}
