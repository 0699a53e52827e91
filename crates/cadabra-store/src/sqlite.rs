use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use cadabra_core::{Assignment, Experiment, ExperimentId, ExperimentStatus, User, UserId};
use jiff::Timestamp;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::{ExperimentStore, StoreError};

/// SQLite-backed store
///
/// Uniqueness of experiment names and of (experiment, user) pairs is
/// enforced by the schema; get-or-create inserts with `ON CONFLICT DO
/// NOTHING` and then reads back whichever row won. Timestamps are stored
/// as integer milliseconds since the Unix epoch.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to `url` and create the schema if missing
    ///
    /// In-memory databases are limited to a single connection so every
    /// query sees the same data.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");

        // Ensure the directory exists if it's a file path
        if let Some(path_part) = url.strip_prefix("sqlite://")
            && !in_memory
        {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StoreError::Backend(format!("failed to create database directory: {e}")))?;
            }
        }

        let mut options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { max_connections.max(1) })
            .connect_with(options)
            .await?;

        tracing::info!(url, "connected to experiment database");

        let store = Self { pool };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<(), StoreError> {
        let statements = [
            r"
            CREATE TABLE IF NOT EXISTS experiments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'active'
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_experiments_created ON experiments (created_at)",
            r"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL,
                date_joined INTEGER NOT NULL
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_users_joined ON users (date_joined)",
            r"
            CREATE TABLE IF NOT EXISTS assignments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                experiment_id INTEGER NOT NULL REFERENCES experiments (id),
                user_id INTEGER NOT NULL,
                bucket TEXT,
                created_at INTEGER NOT NULL,
                UNIQUE (experiment_id, user_id)
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_assignments_bucket ON assignments (experiment_id, bucket)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        Ok(())
    }

    async fn experiment_by_name(&self, name: &str) -> Result<Option<Experiment>, StoreError> {
        let row = sqlx::query("SELECT id, name, created_at, status FROM experiments WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(experiment_from_row).transpose()
    }

    async fn assignment(&self, experiment_id: ExperimentId, user_id: UserId) -> Result<Option<Assignment>, StoreError> {
        let row = sqlx::query(
            "SELECT experiment_id, user_id, bucket, created_at FROM assignments WHERE experiment_id = ? AND user_id = ?",
        )
        .bind(experiment_id.0)
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(assignment_from_row).transpose()
    }
}

#[async_trait]
impl ExperimentStore for SqliteStore {
    async fn get_or_create_experiment(&self, name: &str) -> Result<(Experiment, bool), StoreError> {
        let result = sqlx::query(
            "INSERT INTO experiments (name, created_at, status) VALUES (?, ?, ?) ON CONFLICT (name) DO NOTHING",
        )
        .bind(name)
        .bind(Timestamp::now().as_millisecond())
        .bind(ExperimentStatus::Active.to_string())
        .execute(&self.pool)
        .await?;

        let created = result.rows_affected() == 1;
        let experiment = self
            .experiment_by_name(name)
            .await?
            .ok_or_else(|| StoreError::Backend(format!("experiment '{name}' vanished after insert")))?;

        Ok((experiment, created))
    }

    async fn experiment(&self, id: ExperimentId) -> Result<Option<Experiment>, StoreError> {
        let row = sqlx::query("SELECT id, name, created_at, status FROM experiments WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(experiment_from_row).transpose()
    }

    async fn experiments(&self) -> Result<Vec<Experiment>, StoreError> {
        let rows = sqlx::query("SELECT id, name, created_at, status FROM experiments ORDER BY created_at DESC, id DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(experiment_from_row).collect()
    }

    async fn set_experiment_status(
        &self,
        id: ExperimentId,
        status: ExperimentStatus,
    ) -> Result<Option<Experiment>, StoreError> {
        sqlx::query("UPDATE experiments SET status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        self.experiment(id).await
    }

    async fn get_or_create_assignment(
        &self,
        experiment_id: ExperimentId,
        user_id: UserId,
        bucket: &str,
    ) -> Result<(Assignment, bool), StoreError> {
        let result = sqlx::query(
            r"
            INSERT INTO assignments (experiment_id, user_id, bucket, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (experiment_id, user_id) DO NOTHING
            ",
        )
        .bind(experiment_id.0)
        .bind(user_id.0)
        .bind(bucket)
        .bind(Timestamp::now().as_millisecond())
        .execute(&self.pool)
        .await?;

        let created = result.rows_affected() == 1;
        let assignment = self.assignment(experiment_id, user_id).await?.ok_or_else(|| {
            StoreError::Backend(format!(
                "assignment for experiment {experiment_id} and user {user_id} vanished after insert"
            ))
        })?;

        Ok((assignment, created))
    }

    async fn fill_missing_bucket(
        &self,
        experiment_id: ExperimentId,
        user_id: UserId,
        bucket: &str,
    ) -> Result<Option<Assignment>, StoreError> {
        sqlx::query("UPDATE assignments SET bucket = ? WHERE experiment_id = ? AND user_id = ? AND bucket IS NULL")
            .bind(bucket)
            .bind(experiment_id.0)
            .bind(user_id.0)
            .execute(&self.pool)
            .await?;

        self.assignment(experiment_id, user_id).await
    }

    async fn record_assignment(&self, assignment: &Assignment) -> Result<(), StoreError> {
        let result = sqlx::query("INSERT INTO assignments (experiment_id, user_id, bucket, created_at) VALUES (?, ?, ?, ?)")
            .bind(assignment.experiment_id.0)
            .bind(assignment.user_id.0)
            .bind(assignment.bucket.as_deref())
            .bind(assignment.created_at.as_millisecond())
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(StoreError::Conflict {
                experiment_id: assignment.experiment_id,
                user_id: assignment.user_id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn bucket_labels(&self, experiment_id: ExperimentId) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT DISTINCT bucket FROM assignments WHERE experiment_id = ? AND bucket IS NOT NULL")
            .bind(experiment_id.0)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("bucket").map_err(StoreError::from))
            .collect()
    }

    async fn participants(
        &self,
        experiment_id: ExperimentId,
        bucket: Option<&str>,
        joined_since: Option<Timestamp>,
    ) -> Result<Vec<User>, StoreError> {
        let since = joined_since.map(Timestamp::as_millisecond);
        let rows = sqlx::query(
            r"
            SELECT u.id, u.username, u.date_joined
            FROM users u
            JOIN assignments a ON a.user_id = u.id
            WHERE a.experiment_id = ?
              AND (? IS NULL OR a.bucket = ?)
              AND (? IS NULL OR u.date_joined >= ?)
            ORDER BY u.id
            ",
        )
        .bind(experiment_id.0)
        .bind(bucket)
        .bind(bucket)
        .bind(since)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(user_from_row).collect()
    }

    async fn latest_assignment(&self, experiment_id: ExperimentId) -> Result<Option<Assignment>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT experiment_id, user_id, bucket, created_at
            FROM assignments
            WHERE experiment_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            ",
        )
        .bind(experiment_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(assignment_from_row).transpose()
    }

    async fn save_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO users (id, username, date_joined)
            VALUES (?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                username = excluded.username,
                date_joined = excluded.date_joined
            ",
        )
        .bind(user.id.0)
        .bind(&user.username)
        .bind(user.date_joined.as_millisecond())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT id, username, date_joined FROM users WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

fn timestamp(millis: i64) -> Result<Timestamp, StoreError> {
    Timestamp::from_millisecond(millis).map_err(|e| StoreError::Corrupt(format!("timestamp {millis}: {e}")))
}

fn experiment_from_row(row: &SqliteRow) -> Result<Experiment, StoreError> {
    let status: String = row.try_get("status")?;
    let status = ExperimentStatus::from_str(&status)
        .map_err(|_| StoreError::Corrupt(format!("unknown experiment status '{status}'")))?;

    Ok(Experiment {
        id: ExperimentId(row.try_get("id")?),
        name: row.try_get("name")?,
        created_at: timestamp(row.try_get("created_at")?)?,
        status,
    })
}

fn assignment_from_row(row: &SqliteRow) -> Result<Assignment, StoreError> {
    Ok(Assignment {
        experiment_id: ExperimentId(row.try_get("experiment_id")?),
        user_id: UserId(row.try_get("user_id")?),
        bucket: row.try_get("bucket")?,
        created_at: timestamp(row.try_get("created_at")?)?,
    })
}

fn user_from_row(row: &SqliteRow) -> Result<User, StoreError> {
    Ok(User {
        id: UserId(row.try_get("id")?),
        username: row.try_get("username")?,
        date_joined: timestamp(row.try_get("date_joined")?)?,
    })
}
