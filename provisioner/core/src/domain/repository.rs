// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Job Store Interface
//!
//! Persistence contract for the [`Job`] aggregate, defined in the domain layer
//! and implemented in `crate::infrastructure::repositories`.
//!
//! | Implementation | Scope |
//! |----------------|-------|
//! | `InMemoryJobRepository` | single process (development, tests, `gateway --with-worker`) |
//! | `PostgresJobRepository` | shared by every gateway replica and worker |
//!
//! ## Atomicity
//!
//! Every state change is a compare-and-swap on the stored state:
//! - [`JobRepository::claim_next`] moves exactly one `Pending` job to `Started`
//! - [`JobRepository::transition`] only writes over a non-terminal state and
//!   reports [`Transition::NoOp`] otherwise
//! - [`JobRepository::submit_exclusive`] inserts only when the identity has no
//!   in-flight job

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::identity::Identity;
use crate::domain::job::{Job, JobId, TerminalState, Transition};

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
    pub max_connections: u32,
}

/// Outcome of a stale-job sweep.
#[derive(Debug, Default)]
pub struct ReclaimedJobs {
    /// Jobs re-claimed for another attempt; the caller must run them.
    pub requeued: Vec<Job>,
    /// Jobs that exhausted their attempts and were failed.
    pub abandoned: Vec<JobId>,
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Create a `Pending` job. Concurrent calls for the same identity may race.
    async fn submit(&self, identity: &Identity) -> Result<JobId, RepositoryError>;

    /// Create a `Pending` job unless the identity already has one in flight,
    /// in which case [`RepositoryError::Conflict`] is returned.
    async fn submit_exclusive(&self, identity: &Identity) -> Result<JobId, RepositoryError>;

    /// Find job by ID
    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>, RepositoryError>;

    /// Most recent `Pending`/`Started` job for an identity
    async fn find_in_flight(&self, identity: &Identity) -> Result<Option<Job>, RepositoryError>;

    /// Atomically move the oldest `Pending` job to `Started` and return it.
    async fn claim_next(&self) -> Result<Option<Job>, RepositoryError>;

    /// Record a terminal state with its payload. Terminal jobs are not touched.
    async fn transition(&self, id: JobId, terminal: TerminalState) -> Result<Transition, RepositoryError>;

    /// Re-claim `Started` jobs whose `started_at` is older than `started_before`.
    /// Jobs that already used `max_attempts` are failed instead.
    async fn reclaim_stale(
        &self,
        started_before: DateTime<Utc>,
        max_attempts: u32,
    ) -> Result<ReclaimedJobs, RepositoryError>;

    /// Delete terminal jobs finished more than `ttl` ago. Returns the count.
    async fn purge_expired(&self, ttl: chrono::Duration) -> Result<u64, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RepositoryError::Conflict(db.message().to_string())
            }
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

impl From<crate::domain::identity::IdentityError> for RepositoryError {
    fn from(err: crate::domain::identity::IdentityError) -> Self {
        RepositoryError::Serialization(format!("stored identity is invalid: {err}"))
    }
}

impl From<crate::domain::job::JobError> for RepositoryError {
    fn from(err: crate::domain::job::JobError) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
