use std::fmt;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Synthetic bucket label meaning "every participant of the experiment"
///
/// Never valid as a recorded bucket.
pub const ALL_BUCKETS: &str = "All";

/// Maximum length of experiment names and bucket labels
pub const MAX_NAME_LEN: usize = 100;

/// Identifier of a stored experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperimentId(pub i64);

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Soft-delete state of an experiment
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExperimentStatus {
    #[default]
    Active,
    Inactive,
}

/// A named A/B test
///
/// Created lazily on first assignment and never deleted, only deactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experiment {
    pub id: ExperimentId,
    /// Unique, immutable name (e.g. `E1234 - new next button`)
    pub name: String,
    pub created_at: Timestamp,
    pub status: ExperimentStatus,
}

impl Experiment {
    pub fn is_active(&self) -> bool {
        self.status == ExperimentStatus::Active
    }
}

/// The bucket a user was placed in for one experiment
///
/// `bucket` is optional only so that rows written without a label can be
/// detected and repaired; every row created by the assignment engine has one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub experiment_id: ExperimentId,
    pub user_id: crate::UserId,
    pub bucket: Option<String>,
    pub created_at: Timestamp,
}
