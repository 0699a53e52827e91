use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use cadabra_core::{Assignment, Experiment, ExperimentId, ExperimentStatus, User, UserId};
use jiff::Timestamp;

use crate::{ExperimentStore, StoreError};

#[derive(Default)]
struct Tables {
    experiments: BTreeMap<ExperimentId, Experiment>,
    assignments: BTreeMap<(ExperimentId, UserId), Assignment>,
    users: BTreeMap<UserId, User>,
    next_experiment_id: i64,
}

/// In-process store
///
/// One mutex guards every table, which makes each get-or-create atomic.
/// Nothing survives a restart; intended for tests and single-node demos.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ExperimentStore for MemoryStore {
    async fn get_or_create_experiment(&self, name: &str) -> Result<(Experiment, bool), StoreError> {
        let mut tables = self.tables();

        if let Some(existing) = tables.experiments.values().find(|e| e.name == name) {
            return Ok((existing.clone(), false));
        }

        tables.next_experiment_id += 1;
        let experiment = Experiment {
            id: ExperimentId(tables.next_experiment_id),
            name: name.to_owned(),
            created_at: Timestamp::now(),
            status: ExperimentStatus::Active,
        };
        tables.experiments.insert(experiment.id, experiment.clone());

        Ok((experiment, true))
    }

    async fn experiment(&self, id: ExperimentId) -> Result<Option<Experiment>, StoreError> {
        Ok(self.tables().experiments.get(&id).cloned())
    }

    async fn experiments(&self) -> Result<Vec<Experiment>, StoreError> {
        let mut experiments: Vec<_> = self.tables().experiments.values().cloned().collect();
        experiments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(experiments)
    }

    async fn set_experiment_status(
        &self,
        id: ExperimentId,
        status: ExperimentStatus,
    ) -> Result<Option<Experiment>, StoreError> {
        let mut tables = self.tables();
        let Some(experiment) = tables.experiments.get_mut(&id) else {
            return Ok(None);
        };
        experiment.status = status;
        Ok(Some(experiment.clone()))
    }

    async fn get_or_create_assignment(
        &self,
        experiment_id: ExperimentId,
        user_id: UserId,
        bucket: &str,
    ) -> Result<(Assignment, bool), StoreError> {
        let mut tables = self.tables();

        if let Some(existing) = tables.assignments.get(&(experiment_id, user_id)) {
            return Ok((existing.clone(), false));
        }

        let assignment = Assignment {
            experiment_id,
            user_id,
            bucket: Some(bucket.to_owned()),
            created_at: Timestamp::now(),
        };
        tables.assignments.insert((experiment_id, user_id), assignment.clone());

        Ok((assignment, true))
    }

    async fn fill_missing_bucket(
        &self,
        experiment_id: ExperimentId,
        user_id: UserId,
        bucket: &str,
    ) -> Result<Option<Assignment>, StoreError> {
        let mut tables = self.tables();
        let Some(assignment) = tables.assignments.get_mut(&(experiment_id, user_id)) else {
            return Ok(None);
        };

        if assignment.bucket.is_none() {
            assignment.bucket = Some(bucket.to_owned());
        }
        Ok(Some(assignment.clone()))
    }

    async fn record_assignment(&self, assignment: &Assignment) -> Result<(), StoreError> {
        let mut tables = self.tables();
        let key = (assignment.experiment_id, assignment.user_id);

        if tables.assignments.contains_key(&key) {
            return Err(StoreError::Conflict {
                experiment_id: assignment.experiment_id,
                user_id: assignment.user_id,
            });
        }

        tables.assignments.insert(key, assignment.clone());
        Ok(())
    }

    async fn bucket_labels(&self, experiment_id: ExperimentId) -> Result<Vec<String>, StoreError> {
        let mut labels: Vec<String> = self
            .tables()
            .assignments
            .values()
            .filter(|a| a.experiment_id == experiment_id)
            .filter_map(|a| a.bucket.clone())
            .collect();
        labels.sort();
        labels.dedup();
        Ok(labels)
    }

    async fn participants(
        &self,
        experiment_id: ExperimentId,
        bucket: Option<&str>,
        joined_since: Option<Timestamp>,
    ) -> Result<Vec<User>, StoreError> {
        let tables = self.tables();

        let users = tables
            .assignments
            .values()
            .filter(|a| a.experiment_id == experiment_id)
            .filter(|a| bucket.is_none_or(|b| a.bucket.as_deref() == Some(b)))
            .filter_map(|a| tables.users.get(&a.user_id))
            .filter(|u| joined_since.is_none_or(|since| u.date_joined >= since))
            .cloned();

        let mut users: Vec<User> = users.collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn latest_assignment(&self, experiment_id: ExperimentId) -> Result<Option<Assignment>, StoreError> {
        Ok(self
            .tables()
            .assignments
            .values()
            .filter(|a| a.experiment_id == experiment_id)
            .max_by_key(|a| a.created_at)
            .cloned())
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        self.tables().users.insert(user.id, user.clone());
        Ok(())
    }

    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.tables().users.get(&id).cloned())
    }
}
