//! Durable storage for experiments, assignments and users
//!
//! The store is the single source of truth. Both get-or-create operations
//! are atomic: when two callers race on the same key, exactly one row is
//! created and both observe it.

#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

mod memory;
mod sqlite;

use async_trait::async_trait;
use cadabra_core::{Assignment, Experiment, ExperimentId, ExperimentStatus, User, UserId};
use jiff::Timestamp;
use thiserror::Error;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database connection or query error
    #[error("store backend: {0}")]
    Backend(String),

    /// A row already exists for this (experiment, user) pair
    #[error("assignment already exists for experiment {experiment_id} and user {user_id}")]
    Conflict {
        experiment_id: ExperimentId,
        user_id: UserId,
    },

    /// A stored row could not be decoded
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

/// Durable experiment storage
#[async_trait]
pub trait ExperimentStore: Send + Sync {
    /// Fetch the experiment with this name, creating it if needed
    ///
    /// Returns the experiment and whether this call created it.
    async fn get_or_create_experiment(&self, name: &str) -> Result<(Experiment, bool), StoreError>;

    async fn experiment(&self, id: ExperimentId) -> Result<Option<Experiment>, StoreError>;

    /// All experiments, newest first
    async fn experiments(&self) -> Result<Vec<Experiment>, StoreError>;

    /// Change the soft-delete status, `None` if the experiment does not exist
    async fn set_experiment_status(
        &self,
        id: ExperimentId,
        status: ExperimentStatus,
    ) -> Result<Option<Experiment>, StoreError>;

    /// Fetch the assignment for this pair, creating it with `bucket` if needed
    ///
    /// An existing row keeps whatever bucket it already has. Returns the row
    /// and whether this call created it.
    async fn get_or_create_assignment(
        &self,
        experiment_id: ExperimentId,
        user_id: UserId,
        bucket: &str,
    ) -> Result<(Assignment, bool), StoreError>;

    /// Set the bucket of an existing row only if it has none
    ///
    /// Returns the row as stored afterwards, `None` if there is no row.
    async fn fill_missing_bucket(
        &self,
        experiment_id: ExperimentId,
        user_id: UserId,
        bucket: &str,
    ) -> Result<Option<Assignment>, StoreError>;

    /// Insert a fully-formed assignment row
    ///
    /// Used for imports and backfills; fails with [`StoreError::Conflict`]
    /// if the pair already has a row.
    async fn record_assignment(&self, assignment: &Assignment) -> Result<(), StoreError>;

    /// Distinct bucket labels recorded for an experiment, in no particular order
    async fn bucket_labels(&self, experiment_id: ExperimentId) -> Result<Vec<String>, StoreError>;

    /// Known users assigned to the experiment, ordered by id
    ///
    /// Restricted to one bucket when `bucket` is set and to users who joined
    /// at or after `joined_since` when that is set.
    async fn participants(
        &self,
        experiment_id: ExperimentId,
        bucket: Option<&str>,
        joined_since: Option<Timestamp>,
    ) -> Result<Vec<User>, StoreError>;

    /// Most recently created assignment of an experiment
    async fn latest_assignment(&self, experiment_id: ExperimentId) -> Result<Option<Assignment>, StoreError>;

    /// Insert or update a user
    async fn save_user(&self, user: &User) -> Result<(), StoreError>;

    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError>;
}
